//! Modem profiles and the engine-wide configuration surface.

/// One of the two named 2-FSK profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum Mode {
    High,
    Low,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::High
    }
}

/// A fully resolved modem profile: two carrier frequencies and a bit rate.
///
/// Sample rate is carried alongside rather than baked in, so the
/// implementation can adapt to whatever rate the capture device
/// actually supplies instead of assuming the 48 kHz nominal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModemProfile {
    pub f0_hz: f64,
    pub f1_hz: f64,
    pub bit_rate: f64,
}

impl Mode {
    pub fn profile(self) -> ModemProfile {
        match self {
            Mode::High => ModemProfile {
                f0_hz: 18_700.0,
                f1_hz: 19_300.0,
                bit_rate: 40.0,
            },
            Mode::Low => ModemProfile {
                f0_hz: 17_500.0,
                f1_hz: 18_100.0,
                bit_rate: 10.0,
            },
        }
    }
}

pub const NOMINAL_SAMPLE_RATE_HZ: u32 = 48_000;

/// Goertzel bit-decision threshold. Kept as two independently-tunable
/// knobs: the linear-magnitude path and the FFT-fallback dB path are
/// not the same scale and must not be cross-derived.
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct DetectionThresholds {
    pub linear_magnitude: f32,
    pub fallback_db: f32,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            // roughly -60 dB of a normalised [-1, 1] input
            linear_magnitude: 0.001,
            fallback_db: -60.0,
        }
    }
}

/// Configuration surface recognised at runtime.
#[derive(Debug, Clone, Copy, uniffi::Record)]
pub struct EngineConfig {
    pub mode: Mode,
    /// 0..=100, linearly mapped to amplitude [0, 1].
    pub volume: u8,
    pub auto_discovery: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::High,
            volume: 80,
            auto_discovery: true,
        }
    }
}

impl EngineConfig {
    pub fn amplitude(&self) -> f32 {
        (self.volume.min(100) as f32) / 100.0
    }
}

/// Construction-time configuration for the session layer. Deliberately
/// has no process-global settings reads of its own.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub username: String,
    pub user_id: Option<String>,
}

impl SessionConfig {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_id: None,
        }
    }
}

/// Fallback display name: `"user" + 4 hex chars`.
pub fn fallback_username(random_u16: u16) -> String {
    format!("user{:04x}", random_u16)
}
