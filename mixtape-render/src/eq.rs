//! 3-band EQ with Butterworth crossovers
//!
//! Splits the signal at 250 Hz and 4 kHz, scales each band by
//! `1 + band_value` (band values in -1..1), and sums the bands back
//! together. Applied per track before mixing.

use crate::dsp::{highpass, lowpass, Biquad, BUTTERWORTH_Q};

/// Low/mid crossover frequency
pub const LOW_CROSSOVER_HZ: f64 = 250.0;
/// Mid/high crossover frequency
pub const HIGH_CROSSOVER_HZ: f64 = 4000.0;

/// Stereo 3-band equalizer.
///
/// Band filters are stateful; one instance processes one track buffer.
pub struct ThreeBandEq {
    low_lp: [Biquad; 2],
    mid_hp: [Biquad; 2],
    mid_lp: [Biquad; 2],
    high_hp: [Biquad; 2],
    low_gain: f32,
    mid_gain: f32,
    high_gain: f32,
}

impl ThreeBandEq {
    /// Create an EQ with per-band adjustments in -1..1.
    pub fn new(sample_rate: u32, low: f64, mid: f64, high: f64) -> Self {
        let sample_rate = sample_rate as f64;
        let low_lp_coeffs = lowpass(LOW_CROSSOVER_HZ, BUTTERWORTH_Q, sample_rate);
        let mid_hp_coeffs = highpass(LOW_CROSSOVER_HZ, BUTTERWORTH_Q, sample_rate);
        let mid_lp_coeffs = lowpass(HIGH_CROSSOVER_HZ, BUTTERWORTH_Q, sample_rate);
        let high_hp_coeffs = highpass(HIGH_CROSSOVER_HZ, BUTTERWORTH_Q, sample_rate);

        let make_pair = |coeffs| {
            let mut biquad = Biquad::new();
            biquad.set_coefficients(coeffs);
            [biquad, biquad]
        };

        Self {
            low_lp: make_pair(low_lp_coeffs),
            mid_hp: make_pair(mid_hp_coeffs),
            mid_lp: make_pair(mid_lp_coeffs),
            high_hp: make_pair(high_hp_coeffs),
            low_gain: (1.0 + low.clamp(-1.0, 1.0)) as f32,
            mid_gain: (1.0 + mid.clamp(-1.0, 1.0)) as f32,
            high_gain: (1.0 + high.clamp(-1.0, 1.0)) as f32,
        }
    }

    /// True when every band is at unity; processing can be skipped.
    pub fn is_flat(&self) -> bool {
        (self.low_gain - 1.0).abs() < f32::EPSILON
            && (self.mid_gain - 1.0).abs() < f32::EPSILON
            && (self.high_gain - 1.0).abs() < f32::EPSILON
    }

    /// Process an interleaved stereo buffer in place.
    pub fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let x = *sample;
                let low = self.low_lp[ch].process(x);
                let mid = self.mid_lp[ch].process(self.mid_hp[ch].process(x));
                let high = self.high_hp[ch].process(x);
                *sample = low * self.low_gain + mid * self.mid_gain + high * self.high_gain;
            }
        }
    }
}
