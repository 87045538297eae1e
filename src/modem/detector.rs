//! Tone detector: PCM frames in, a bit-event stream out.
//!
//! Goertzel energy estimation over a rolling sample window, with a
//! magnitude threshold and a duplicate-suppression gate on the decision.

use std::time::Duration;

use crate::config::{DetectionThresholds, ModemProfile};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitEvent {
    pub value: u8,
    pub strength: f32,
    /// Time since the detector started, derived from the sample clock
    /// rather than wall-clock `Instant` so decoding stays deterministic
    /// and replayable in tests.
    pub t: Duration,
}

/// A Goertzel power estimate at a single target frequency over `window`.
pub fn goertzel_energy(window: &[f32], target_freq: f64, sample_rate: f64) -> f32 {
    let n = window.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let k = (n * target_freq / sample_rate).round();
    let omega = 2.0 * std::f64::consts::PI * k / n;
    let coeff = 2.0 * omega.cos();

    let mut s1 = 0.0f64;
    let mut s2 = 0.0f64;
    for &x in window {
        let y = x as f64 + coeff * s1 - s2;
        s2 = s1;
        s1 = y;
    }
    let energy = (s1 * s1 + s2 * s2 - coeff * s1 * s2).sqrt() / n;
    energy as f32
}

pub const DEFAULT_WINDOW_SIZE: usize = 4096;

pub struct ToneDetector {
    profile: ModemProfile,
    sample_rate: u32,
    window_size: usize,
    thresholds: DetectionThresholds,
    buffer: Vec<f32>,
    samples_consumed: u64,
    last_emit_t: Option<Duration>,
    min_gap: Duration,
}

impl ToneDetector {
    pub fn new(profile: ModemProfile, sample_rate: u32, thresholds: DetectionThresholds) -> Self {
        Self::with_window_size(profile, sample_rate, thresholds, DEFAULT_WINDOW_SIZE)
    }

    pub fn with_window_size(
        profile: ModemProfile,
        sample_rate: u32,
        thresholds: DetectionThresholds,
        window_size: usize,
    ) -> Self {
        let min_gap = Duration::from_secs_f64(0.8 / profile.bit_rate);
        Self {
            profile,
            sample_rate,
            window_size,
            thresholds,
            buffer: Vec::with_capacity(window_size),
            samples_consumed: 0,
            last_emit_t: None,
            min_gap,
        }
    }

    /// Feeds a frame of microphone samples, returning any bit events the
    /// window boundaries crossed produced. Never blocks.
    pub fn push_frame(&mut self, frame: &[f32]) -> Vec<BitEvent> {
        let mut events = Vec::new();
        for &sample in frame {
            self.buffer.push(sample);
            self.samples_consumed += 1;
            if self.buffer.len() == self.window_size {
                if let Some(event) = self.evaluate_window() {
                    events.push(event);
                }
                self.buffer.clear();
            }
        }
        events
    }

    fn evaluate_window(&mut self) -> Option<BitEvent> {
        let e0 = goertzel_energy(&self.buffer, self.profile.f0_hz, self.sample_rate as f64);
        let e1 = goertzel_energy(&self.buffer, self.profile.f1_hz, self.sample_rate as f64);
        let strength = e0.max(e1);
        if strength <= self.thresholds.linear_magnitude {
            return None;
        }
        if e0 == e1 {
            // Tie: ambiguous, treat as noise.
            return None;
        }
        let value = if e1 > e0 { 1 } else { 0 };
        let t = Duration::from_secs_f64(self.samples_consumed as f64 / self.sample_rate as f64);
        if let Some(last) = self.last_emit_t {
            if t.saturating_sub(last) < self.min_gap {
                return None;
            }
        }
        self.last_emit_t = Some(t);
        Some(BitEvent { value, strength, t })
    }

    /// Releases any partial window state. Called by the capture task on
    /// a stop command; the detector itself holds no device handle.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_emit_t = None;
        self.samples_consumed = 0;
    }
}
