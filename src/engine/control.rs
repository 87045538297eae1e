//! Control task: timers for heartbeat, peer sweep, and public room
//! advertisement, running on its own `std::thread`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, tick};

use super::Shared;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);
pub const PEER_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
pub const ROOM_ADVERTISEMENT_INTERVAL: Duration = Duration::from_secs(5);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub enum ControlTick {
    Heartbeat,
    Sweep,
    RoomAdvertise,
}

/// Runs until `shared.running` flips false, calling `on_tick` for each
/// timer firing. A short shutdown-poll tick bounds how long
/// `stopDiscovery` takes to actually stop this thread.
pub fn control_loop(shared: Arc<Shared>, on_tick: impl Fn(&Shared, ControlTick)) {
    let heartbeat = tick(HEARTBEAT_INTERVAL);
    let sweep = tick(PEER_SWEEP_INTERVAL);
    let advertise = tick(ROOM_ADVERTISEMENT_INTERVAL);
    let shutdown_poll = tick(SHUTDOWN_POLL_INTERVAL);

    while shared.running.load(Ordering::Relaxed) {
        select! {
            recv(heartbeat) -> _ => on_tick(&shared, ControlTick::Heartbeat),
            recv(sweep) -> _ => on_tick(&shared, ControlTick::Sweep),
            recv(advertise) -> _ => on_tick(&shared, ControlTick::RoomAdvertise),
            recv(shutdown_poll) -> _ => {},
        }
    }
}
