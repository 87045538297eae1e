//! Engine shell, FFI boundary, and the host-facing application façade.
//!
//! `AcousticEngine` wraps the modem, codec, peer table, and session
//! layers behind a small set of inherent methods, with a background
//! control thread driving timers and a background transmit thread
//! draining the render queue.

mod control;
mod tx_queue;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::codec::FrameCodec;
use crate::config::{EngineConfig, Mode, SessionConfig};
use crate::error::EngineError;
use crate::events::{EngineEvent, PendingInvite};
use crate::modem::{render_pcm, ToneDetector};
use crate::peer::PeerInfo;
use crate::session::{encode_datagram, Datagram, SessionManager};

use control::{control_loop, ControlTick};
use tx_queue::{QueuedFrame, TxQueue};

const DISCOVERY_PEER_EXPIRY: Duration = Duration::from_secs(10);

#[uniffi::export(callback_interface)]
pub trait AudioSink: Send + Sync {
    /// Plays a rendered PCM buffer to completion. Must behave as a
    /// blocking "play to end of buffer" call from the engine's
    /// perspective, since only one frame may be in flight.
    fn play_pcm(&self, samples: Vec<f32>);
}

#[uniffi::export(callback_interface)]
pub trait EngineEventCallback: Send + Sync {
    fn on_event(&self, event: EngineEvent);
}

struct Inner {
    session: SessionManager,
    discovery_peers: crate::peer::PeerTable,
    detector: ToneDetector,
    codec: FrameCodec,
}

/// Everything the control and transmit threads need, held behind an
/// `Arc` so they can outlive a single façade call without borrowing
/// from `AcousticEngine` itself.
struct Shared {
    inner: Mutex<Inner>,
    config: Mutex<EngineConfig>,
    sample_rate: u32,
    running: AtomicBool,
    shutting_down: AtomicBool,
    tx_queue: TxQueue,
    audio_sink: Box<dyn AudioSink>,
    event_cb: Box<dyn EngineEventCallback>,
}

#[derive(uniffi::Object)]
pub struct AcousticEngine {
    shared: Arc<Shared>,
    control_thread: Mutex<Option<JoinHandle<()>>>,
    tx_thread: Mutex<Option<JoinHandle<()>>>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn random_short_id() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl Drop for AcousticEngine {
    fn drop(&mut self) {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.control_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.tx_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[uniffi::export]
impl AcousticEngine {
    #[uniffi::constructor]
    pub fn new(
        config: EngineConfig,
        username: String,
        sample_rate: u32,
        audio_sink: Box<dyn AudioSink>,
        event_callback: Box<dyn EngineEventCallback>,
    ) -> Self {
        let session_config = SessionConfig::new(if username.is_empty() {
            crate::config::fallback_username(rand::thread_rng().next_u32() as u16)
        } else {
            username
        });
        let self_user_id = random_short_id();
        let profile = config.mode.profile();

        let inner = Inner {
            session: SessionManager::new(&session_config, self_user_id.clone()),
            discovery_peers: crate::peer::PeerTable::new(self_user_id, DISCOVERY_PEER_EXPIRY),
            detector: ToneDetector::new(profile, sample_rate, Default::default()),
            codec: FrameCodec::new(),
        };

        let shared = Arc::new(Shared {
            inner: Mutex::new(inner),
            config: Mutex::new(config),
            sample_rate,
            running: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            tx_queue: TxQueue::new(),
            audio_sink,
            event_cb: event_callback,
        });

        let tx_thread = spawn_tx_thread(shared.clone());

        Self {
            shared,
            control_thread: Mutex::new(None),
            tx_thread: Mutex::new(Some(tx_thread)),
        }
    }

    /// Launches the capture-side control timers and emits the one-shot
    /// `discovery` datagram. Idempotent.
    pub fn start_discovery(&self) -> Result<(), EngineError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let discovery = {
            let inner = self.shared.inner.lock().unwrap();
            inner.session.build_discovery(now_ms())
        };
        enqueue_background(&self.shared, &discovery, false);

        let shared = self.shared.clone();
        let handle = thread::spawn(move || {
            control_loop(shared, |s, tick| on_control_tick(s, tick));
        });
        *self.control_thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Stops the control timers and drains not-yet-playing frames; a
    /// frame already in flight completes.
    pub fn stop_discovery(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.control_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.shared.tx_queue.clear_pending();
    }

    pub fn is_discovering(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    /// Capture entry point: the host's audio thread calls this with
    /// consecutive microphone frames. Never blocks beyond Goertzel
    /// evaluation at a window boundary.
    pub fn push_pcm_frame(&self, samples: Vec<f32>) {
        if !self.shared.running.load(Ordering::Relaxed) {
            return;
        }
        let payloads: Vec<Vec<u8>> = {
            let mut inner = self.shared.inner.lock().unwrap();
            let bit_events = inner.detector.push_frame(&samples);
            let mut payloads = Vec::new();
            for event in bit_events {
                payloads.extend(inner.codec.push_bits(&[event.value]));
            }
            payloads
        };
        for payload in payloads {
            handle_incoming_payload(&self.shared, payload);
        }
    }

    pub fn send_chat(&self, text: String) -> Result<(), EngineError> {
        let datagram = {
            let inner = self.shared.inner.lock().unwrap();
            inner.session.send_chat(&text, random_short_id(), now_ms())
        };
        match datagram {
            Some(dg) => enqueue_foreground(&self.shared, &dg, true),
            None => Ok(()), // no current room: silently a no-op, nothing to send
        }
    }

    pub fn create_or_join_room(
        &self,
        room_id: String,
        room_name: String,
        is_private: bool,
    ) -> Result<(), EngineError> {
        let (datagram, event) = {
            let mut inner = self.shared.inner.lock().unwrap();
            inner
                .session
                .create_or_join_room(room_id, room_name, is_private, now_ms())
        };
        self.shared.event_cb.on_event(event);
        enqueue_foreground(&self.shared, &datagram, false)
    }

    pub fn invite_peer(&self, user_id: String) -> Result<(), EngineError> {
        let datagram = {
            let inner = self.shared.inner.lock().unwrap();
            inner.session.invite_peer(user_id, now_ms())
        };
        match datagram {
            Some(dg) => enqueue_foreground(&self.shared, &dg, false),
            None => Ok(()), // no current room: nobody to invite into, silently a no-op
        }
    }

    pub fn accept_invite(&self, invite: PendingInvite) -> Result<(), EngineError> {
        let (datagram, event) = {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.session.accept_invite(invite, now_ms())
        };
        self.shared.event_cb.on_event(event);
        enqueue_foreground(&self.shared, &datagram, false)
    }

    pub fn leave_room(&self) -> Result<(), EngineError> {
        let outcome = {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.session.leave_room(now_ms())
        };
        match outcome {
            Some((datagram, event)) => {
                self.shared.event_cb.on_event(event);
                enqueue_foreground(&self.shared, &datagram, false)
            }
            None => Ok(()),
        }
    }

    pub fn toggle_privacy(&self) -> Result<(), EngineError> {
        let outcome = {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.session.toggle_privacy(now_ms())
        };
        let Some((datagram, events)) = outcome else {
            return Ok(());
        };
        for event in events {
            self.shared.event_cb.on_event(event);
        }
        match datagram {
            Some(dg) => enqueue_foreground(&self.shared, &dg, false),
            None => Ok(()),
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        let mut config = self.shared.config.lock().unwrap();
        config.mode = mode;
        let profile = mode.profile();
        let mut inner = self.shared.inner.lock().unwrap();
        inner.detector = ToneDetector::new(profile, self.shared.sample_rate, Default::default());
    }

    pub fn set_volume(&self, volume: u8) {
        self.shared.config.lock().unwrap().volume = volume.min(100);
    }

    /// Discovery-layer radar list (10 second expiry), distinct from the
    /// session layer's 30 second "connected users" tracking.
    pub fn list_peers(&self) -> Vec<PeerInfo> {
        self.shared.inner.lock().unwrap().discovery_peers.snapshot()
    }

    pub fn list_connected_users(&self) -> Vec<PeerInfo> {
        self.shared.inner.lock().unwrap().session.connected_peers()
    }

    /// Reports that the mic or speaker could not be opened; device
    /// acquisition itself is the host's responsibility, not this engine's.
    pub fn report_device_unavailable(&self) {
        self.stop_discovery();
        self.shared.event_cb.on_event(EngineEvent::SendFailed {
            reason: "output device is not ready".to_string(),
        });
    }
}

fn handle_incoming_payload(shared: &Shared, payload: Vec<u8>) {
    let datagram = match crate::session::decode_datagram(&payload) {
        Ok(dg) => dg,
        Err(_) => {
            log::warn!("dropping a datagram that failed to parse for its type");
            return;
        }
    };

    if let (Some(user_id), Some(username)) = heartbeat_fields(&datagram) {
        shared
            .inner
            .lock()
            .unwrap()
            .discovery_peers
            .observe(user_id, username);
    }

    let events = {
        let mut inner = shared.inner.lock().unwrap();
        inner.session.dispatch(datagram, Instant::now())
    };
    for event in events {
        shared.event_cb.on_event(event);
    }
}

fn on_control_tick(shared: &Shared, tick: ControlTick) {
    match tick {
        ControlTick::Heartbeat => {
            let datagram = {
                let inner = shared.inner.lock().unwrap();
                inner.session.build_heartbeat(now_ms())
            };
            enqueue_background(shared, &datagram, false);
        }
        ControlTick::Sweep => {
            let mut inner = shared.inner.lock().unwrap();
            inner.discovery_peers.sweep();
            inner.session.sweep_connected_users();
        }
        ControlTick::RoomAdvertise => {
            let datagram = {
                let inner = shared.inner.lock().unwrap();
                inner.session.build_room_update(now_ms())
            };
            if let Some(dg) = datagram {
                enqueue_background(shared, &dg, false);
            }
        }
    }
}

fn enqueue_foreground(shared: &Shared, datagram: &Datagram, is_chat: bool) -> Result<(), EngineError> {
    let bits = encode_datagram(datagram).map_err(|_| EngineError::PayloadTooLarge)?;
    shared.tx_queue.try_push_foreground(QueuedFrame { bits, is_chat })
}

fn enqueue_background(shared: &Shared, datagram: &Datagram, is_chat: bool) {
    match encode_datagram(datagram) {
        Ok(bits) => shared.tx_queue.push_background(QueuedFrame { bits, is_chat }),
        Err(_) => log::warn!("dropping an oversized control-task datagram before the wire"),
    }
}

fn spawn_tx_thread(shared: Arc<Shared>) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shared.tx_queue.pop() {
            Some(frame) => {
                let (profile, amplitude) = {
                    let cfg = shared.config.lock().unwrap();
                    (cfg.mode.profile(), cfg.amplitude())
                };
                let pcm = render_pcm(&frame.bits, &profile, shared.sample_rate, amplitude);
                shared.audio_sink.play_pcm(pcm);
            }
            None => {
                if shared.shutting_down.load(Ordering::Relaxed) {
                    break;
                }
                shared.tx_queue.wait_for_work(Duration::from_millis(200));
            }
        }
    })
}

fn heartbeat_fields(datagram: &Datagram) -> (Option<&str>, Option<&str>) {
    match datagram {
        Datagram::Heartbeat { user_id, username, .. } => (Some(user_id), Some(username)),
        Datagram::Discovery { user_id, username, .. } => (Some(user_id), Some(username)),
        _ => (None, None),
    }
}
