//! Frequency-sweeping effects: filter sweep and EQ sweep
//!
//! Both sweep a filter center/cutoff logarithmically across the effect
//! segment, recomputing coefficients per block while the filter state runs
//! continuously across block boundaries.

use crate::dsp::{peaking, Biquad, Butterworth4Lowpass};

/// Frames per coefficient update
const SWEEP_BLOCK_FRAMES: usize = 1024;

/// Sweep floor and ceiling for the low-pass cutoff
const SWEEP_MIN_HZ: f64 = 200.0;
const SWEEP_SPAN_HZ: f64 = 8000.0 - SWEEP_MIN_HZ;

/// Peaking sweep range for [`eq_sweep`]
const EQ_SWEEP_START_HZ: f64 = 200.0;
const EQ_SWEEP_END_HZ: f64 = 4000.0;
/// Peaking Q for the EQ sweep
const EQ_SWEEP_Q: f64 = 0.5;

/// 4th-order Butterworth low-pass whose cutoff opens logarithmically from
/// 200 Hz toward `200 + 7800·intensity` Hz across the segment, clamped to
/// [100, 0.95·Nyquist].
pub fn filter_sweep(buffer: &mut [f32], sample_rate: u32, intensity: f64) {
    let frames = buffer.len() / 2;
    if frames == 0 {
        return;
    }

    // A meaningful filter needs headroom above the sweep floor; below that
    // fall back to plain amplitude attenuation.
    let nyquist = sample_rate as f64 / 2.0;
    if nyquist * 0.95 <= 100.0 {
        amplitude_fallback(buffer, intensity);
        return;
    }

    let target = SWEEP_MIN_HZ + SWEEP_SPAN_HZ * intensity;
    let mut filter = Butterworth4Lowpass::new(SWEEP_MIN_HZ, sample_rate as f64);

    for block_start in (0..frames).step_by(SWEEP_BLOCK_FRAMES) {
        let progress = block_start as f64 / frames as f64;
        let cutoff =
            (SWEEP_MIN_HZ * (target / SWEEP_MIN_HZ).powf(progress)).clamp(100.0, nyquist * 0.95);
        filter.set_cutoff(cutoff);

        let block_end = (block_start + SWEEP_BLOCK_FRAMES).min(frames);
        for frame in block_start..block_end {
            let (l, r) = filter.process_frame(buffer[2 * frame], buffer[2 * frame + 1]);
            buffer[2 * frame] = l;
            buffer[2 * frame + 1] = r;
        }
    }
}

/// Fallback when no usable filter can be built: fade the amplitude by
/// `1 - intensity·progress·0.5`.
fn amplitude_fallback(buffer: &mut [f32], intensity: f64) {
    let frames = buffer.len() / 2;
    for frame in 0..frames {
        let progress = frame as f64 / frames as f64;
        let gain = (1.0 - intensity * progress * 0.5) as f32;
        buffer[2 * frame] *= gain;
        buffer[2 * frame + 1] *= gain;
    }
}

/// Peaking EQ whose center slides log-linearly from 200 Hz to 4 kHz across
/// the segment, boosting `intensity·12 dB` at the center, mixed with the
/// dry signal at `intensity·0.5`.
pub fn eq_sweep(buffer: &mut [f32], sample_rate: u32, intensity: f64) {
    let frames = buffer.len() / 2;
    if frames == 0 {
        return;
    }
    let nyquist = sample_rate as f64 / 2.0;
    if nyquist <= EQ_SWEEP_END_HZ {
        return;
    }

    let gain_db = intensity * 12.0;
    let wet = (intensity * 0.5) as f32;
    let dry_gain = 1.0 - wet;
    let mut filters = [Biquad::new(), Biquad::new()];

    for block_start in (0..frames).step_by(SWEEP_BLOCK_FRAMES) {
        let progress = block_start as f64 / frames as f64;
        let center =
            EQ_SWEEP_START_HZ * (EQ_SWEEP_END_HZ / EQ_SWEEP_START_HZ).powf(progress);
        let coeffs = peaking(center, EQ_SWEEP_Q, gain_db, sample_rate as f64);
        filters[0].set_coefficients(coeffs);
        filters[1].set_coefficients(coeffs);

        let block_end = (block_start + SWEEP_BLOCK_FRAMES).min(frames);
        for frame in block_start..block_end {
            for (ch, filter) in filters.iter_mut().enumerate() {
                let idx = 2 * frame + ch;
                let dry = buffer[idx];
                buffer[idx] = dry * dry_gain + filter.process(dry) * wet;
            }
        }
    }
}
