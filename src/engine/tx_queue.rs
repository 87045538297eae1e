//! The single-slot transmit lock's waiting room: a bounded queue of
//! frames not yet rendered. On overflow the oldest non-chat frame is
//! evicted first, then the oldest chat frame.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::EngineError;

pub const QUEUE_CAPACITY: usize = 8;

pub struct QueuedFrame {
    pub bits: Vec<u8>,
    pub is_chat: bool,
}

pub struct TxQueue {
    items: Mutex<VecDeque<QueuedFrame>>,
    doorbell_tx: Sender<()>,
    doorbell_rx: Receiver<()>,
}

impl TxQueue {
    pub fn new() -> Self {
        let (doorbell_tx, doorbell_rx) = bounded(1);
        Self {
            items: Mutex::new(VecDeque::new()),
            doorbell_tx,
            doorbell_rx,
        }
    }

    /// Foreground call path: fails fast with `Busy` rather than waiting
    /// when the queue is already full.
    pub fn try_push_foreground(&self, frame: QueuedFrame) -> Result<(), EngineError> {
        let mut items = self.items.lock().unwrap();
        if items.len() >= QUEUE_CAPACITY {
            return Err(EngineError::Busy);
        }
        items.push_back(frame);
        drop(items);
        self.ring_doorbell();
        Ok(())
    }

    /// Control-task call path: never fails. Evicts the oldest non-chat
    /// frame first, then the oldest chat frame, to make room.
    pub fn push_background(&self, frame: QueuedFrame) {
        let mut items = self.items.lock().unwrap();
        if items.len() >= QUEUE_CAPACITY {
            if let Some(pos) = items.iter().position(|f| !f.is_chat) {
                items.remove(pos);
            } else {
                items.pop_front();
            }
        }
        items.push_back(frame);
        drop(items);
        self.ring_doorbell();
    }

    pub fn pop(&self) -> Option<QueuedFrame> {
        self.items.lock().unwrap().pop_front()
    }

    /// `stopDiscovery` drains not-yet-playing frames; an in-flight
    /// render still completes.
    pub fn clear_pending(&self) {
        self.items.lock().unwrap().clear();
    }

    pub fn wait_for_work(&self, timeout: Duration) {
        let _ = self.doorbell_rx.recv_timeout(timeout);
    }

    fn ring_doorbell(&self) {
        let _ = self.doorbell_tx.try_send(());
    }
}

impl Default for TxQueue {
    fn default() -> Self {
        Self::new()
    }
}
