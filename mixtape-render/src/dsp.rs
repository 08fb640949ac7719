//! Biquad filter primitives
//!
//! RBJ cookbook second-order sections used by the 3-band EQ and the
//! frequency-domain effect kernels. Coefficients are normalized by a0;
//! processing is transposed direct form II.

/// One second-order IIR section
#[derive(Debug, Clone, Copy, Default)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            ..Default::default()
        }
    }

    pub fn set_coefficients(&mut self, coeffs: Coefficients) {
        self.b0 = coeffs.b0;
        self.b1 = coeffs.b1;
        self.b2 = coeffs.b2;
        self.a1 = coeffs.a1;
        self.a2 = coeffs.a2;
    }

    /// Clear the delay line. Coefficients are kept.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let x = input as f64;
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y as f32
    }
}

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Second-order Butterworth Q
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Section Qs for a 4th-order Butterworth cascade
pub const BUTTERWORTH4_Q: [f64; 2] = [0.54119610, 1.30656296];

/// RBJ low-pass coefficients.
pub fn lowpass(cutoff_hz: f64, q: f64, sample_rate: f64) -> Coefficients {
    let w0 = 2.0 * std::f64::consts::PI * cutoff_hz / sample_rate;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    let a0 = 1.0 + alpha;
    Coefficients {
        b0: (1.0 - cos_w0) / 2.0 / a0,
        b1: (1.0 - cos_w0) / a0,
        b2: (1.0 - cos_w0) / 2.0 / a0,
        a1: -2.0 * cos_w0 / a0,
        a2: (1.0 - alpha) / a0,
    }
}

/// RBJ high-pass coefficients.
pub fn highpass(cutoff_hz: f64, q: f64, sample_rate: f64) -> Coefficients {
    let w0 = 2.0 * std::f64::consts::PI * cutoff_hz / sample_rate;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    let a0 = 1.0 + alpha;
    Coefficients {
        b0: (1.0 + cos_w0) / 2.0 / a0,
        b1: -(1.0 + cos_w0) / a0,
        b2: (1.0 + cos_w0) / 2.0 / a0,
        a1: -2.0 * cos_w0 / a0,
        a2: (1.0 - alpha) / a0,
    }
}

/// RBJ peaking-EQ coefficients.
pub fn peaking(center_hz: f64, q: f64, gain_db: f64, sample_rate: f64) -> Coefficients {
    let a = 10f64.powf(gain_db / 40.0);
    let w0 = 2.0 * std::f64::consts::PI * center_hz / sample_rate;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    let a0 = 1.0 + alpha / a;
    Coefficients {
        b0: (1.0 + alpha * a) / a0,
        b1: -2.0 * cos_w0 / a0,
        b2: (1.0 - alpha * a) / a0,
        a1: -2.0 * cos_w0 / a0,
        a2: (1.0 - alpha / a) / a0,
    }
}

/// 4th-order Butterworth low-pass as a cascade of two stereo sections.
///
/// Cutoff can be swept while processing; filter state carries across
/// coefficient updates so block-wise sweeps stay click-free.
#[derive(Debug, Clone)]
pub struct Butterworth4Lowpass {
    sections: [[Biquad; 2]; 2], // [section][channel]
    sample_rate: f64,
}

impl Butterworth4Lowpass {
    pub fn new(cutoff_hz: f64, sample_rate: f64) -> Self {
        let mut filter = Self {
            sections: [[Biquad::new(); 2]; 2],
            sample_rate,
        };
        filter.set_cutoff(cutoff_hz);
        filter
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f64) {
        let cutoff = cutoff_hz.clamp(10.0, self.sample_rate * 0.49);
        for (section, q) in self.sections.iter_mut().zip(BUTTERWORTH4_Q) {
            let coeffs = lowpass(cutoff, q, self.sample_rate);
            section[0].set_coefficients(coeffs);
            section[1].set_coefficients(coeffs);
        }
    }

    /// Filter one stereo frame.
    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mut l = left;
        let mut r = right;
        for section in self.sections.iter_mut() {
            l = section[0].process(l);
            r = section[1].process(r);
        }
        (l, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Steady-state gain of a filter at a given frequency, measured by
    /// running a sine through it and comparing RMS after settling.
    fn measure_gain(coeffs: Coefficients, freq: f64, sample_rate: f64) -> f64 {
        let mut filter = Biquad::new();
        filter.set_coefficients(coeffs);

        let total = (sample_rate as usize) / 2;
        let settle = total / 2;
        let mut in_sq = 0.0f64;
        let mut out_sq = 0.0f64;
        for n in 0..total {
            let x = (2.0 * std::f64::consts::PI * freq * n as f64 / sample_rate).sin() as f32;
            let y = filter.process(x);
            if n >= settle {
                in_sq += (x as f64) * (x as f64);
                out_sq += (y as f64) * (y as f64);
            }
        }
        (out_sq / in_sq).sqrt()
    }

    #[test]
    fn test_lowpass_passes_low_blocks_high() {
        let coeffs = lowpass(1000.0, BUTTERWORTH_Q, 44100.0);
        assert!(measure_gain(coeffs, 100.0, 44100.0) > 0.95);
        assert!(measure_gain(coeffs, 10000.0, 44100.0) < 0.05);
    }

    #[test]
    fn test_highpass_passes_high_blocks_low() {
        let coeffs = highpass(1000.0, BUTTERWORTH_Q, 44100.0);
        assert!(measure_gain(coeffs, 10000.0, 44100.0) > 0.9);
        assert!(measure_gain(coeffs, 100.0, 44100.0) < 0.05);
    }

    #[test]
    fn test_butterworth_minus_3db_at_cutoff() {
        let coeffs = lowpass(1000.0, BUTTERWORTH_Q, 44100.0);
        let gain = measure_gain(coeffs, 1000.0, 44100.0);
        assert!((gain - BUTTERWORTH_Q).abs() < 0.02, "gain at cutoff: {gain}");
    }

    #[test]
    fn test_peaking_boosts_center_only() {
        let coeffs = peaking(1000.0, 1.0, 12.0, 44100.0);
        let at_center = measure_gain(coeffs, 1000.0, 44100.0);
        let far_away = measure_gain(coeffs, 8000.0, 44100.0);
        assert!(at_center > 3.0, "center gain: {at_center}");
        assert!((far_away - 1.0).abs() < 0.2, "far gain: {far_away}");
    }

    #[test]
    fn test_cascade_steeper_than_single_section() {
        let mut cascade = Butterworth4Lowpass::new(1000.0, 44100.0);
        let single = lowpass(1000.0, BUTTERWORTH_Q, 44100.0);

        // Compare attenuation one octave above cutoff
        let freq = 2000.0;
        let sample_rate = 44100.0;
        let total = 22050;
        let settle = total / 2;
        let mut cascade_sq = 0.0f64;
        let mut in_sq = 0.0f64;
        for n in 0..total {
            let x = (2.0 * std::f64::consts::PI * freq * n as f64 / sample_rate).sin() as f32;
            let (y, _) = cascade.process_frame(x, x);
            if n >= settle {
                cascade_sq += (y as f64) * (y as f64);
                in_sq += (x as f64) * (x as f64);
            }
        }
        let cascade_gain = (cascade_sq / in_sq).sqrt();
        let single_gain = measure_gain(single, freq, sample_rate);
        assert!(
            cascade_gain < single_gain * 0.5,
            "cascade {cascade_gain} vs single {single_gain}"
        );
    }

    #[test]
    fn test_reset_clears_state() {
        let mut filter = Biquad::new();
        filter.set_coefficients(lowpass(500.0, BUTTERWORTH_Q, 44100.0));
        for _ in 0..100 {
            filter.process(1.0);
        }
        filter.reset();
        assert_eq!(filter.z1, 0.0);
        assert_eq!(filter.z2, 0.0);
    }
}
