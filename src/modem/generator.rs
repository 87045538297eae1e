//! Tone generator: bit vector -> mono PCM via 2-FSK.

use crate::config::ModemProfile;

/// Renders `bits` as a mono PCM buffer at `sample_rate`, one symbol per
/// bit, using the active profile's two carrier frequencies.
///
/// Phase is carried from a running accumulator seeded by the absolute
/// sample index rather than reset at each bit boundary, which is what
/// keeps bit transitions from producing audible clicks.
pub fn render_pcm(bits: &[u8], profile: &ModemProfile, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let samples_per_bit = (sample_rate as f64 / profile.bit_rate).ceil() as usize;
    let mut out = Vec::with_capacity(bits.len() * samples_per_bit);
    let mut global_index: u64 = 0;

    for &bit in bits {
        let freq = if bit != 0 { profile.f1_hz } else { profile.f0_hz };
        for _ in 0..samples_per_bit {
            let t = global_index as f64 / sample_rate as f64;
            let sample = (amplitude as f64) * (2.0 * std::f64::consts::PI * freq * t).sin();
            out.push(sample as f32);
            global_index += 1;
        }
    }
    out
}

/// Total sample count `render_pcm` will produce for `n` bits:
/// `ceil(n * sample_rate / bit_rate)`.
pub fn rendered_len(n_bits: usize, profile: &ModemProfile, sample_rate: u32) -> usize {
    let samples_per_bit = (sample_rate as f64 / profile.bit_rate).ceil() as usize;
    n_bits * samples_per_bit
}
