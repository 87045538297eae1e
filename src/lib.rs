pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod modem;
pub mod peer;
pub mod session;

uniffi::setup_scaffolding!("acoustic_link_engine");

pub use config::{DetectionThresholds, EngineConfig, Mode, ModemProfile, SessionConfig};
pub use engine::{AcousticEngine, AudioSink, EngineEventCallback};
pub use error::EngineError;
pub use events::{EngineEvent, PendingInvite};
pub use peer::PeerInfo;

#[cfg(target_os = "android")]
#[uniffi::export]
pub fn init_logger() {
    android_logger::init_once(
        android_logger::Config::default().with_max_level(log::LevelFilter::Debug),
    );
}

#[cfg(not(target_os = "android"))]
#[uniffi::export]
pub fn init_logger() {
    let _ = env_logger::try_init();
}
