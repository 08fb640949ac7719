//! Transition effect DSP kernels
//!
//! Each kernel processes one interleaved stereo segment in place and is a
//! pure function of the segment, the sample rate, and the effect record:
//! no wall clock, no randomness. Any pseudo-periodic motion (LFOs, scratch
//! rate) derives from the sample index.
//!
//! Kernels run on a scratch copy; output containing NaN/Inf is discarded
//! and the segment is left untouched (the effect is skipped, the render
//! continues).

mod delays;
mod rhythm;
mod sweep;

use mixtape_common::set::{EffectKind, TransitionEffect};
use tracing::warn;

pub use delays::{flanger, reverb, tap_delay};
pub use rhythm::{gate, scratch};
pub use sweep::{eq_sweep, filter_sweep};

/// Default echo tap in milliseconds
pub const ECHO_DELAY_MS: f64 = 250.0;
/// Default delay tap in milliseconds
pub const DELAY_DELAY_MS: f64 = 500.0;

/// Apply one scheduled effect to a stereo segment.
///
/// Returns `false` when the kernel produced non-finite output and the
/// segment was left unchanged.
pub fn apply(effect: &TransitionEffect, buffer: &mut [f32], sample_rate: u32) -> bool {
    if buffer.len() < 4 {
        return true;
    }

    let intensity = effect.intensity.clamp(0.0, 1.0);
    let mut processed = buffer.to_vec();

    match effect.kind {
        EffectKind::FilterSweep => filter_sweep(&mut processed, sample_rate, intensity),
        EffectKind::Echo => {
            let delay_ms = effect.param_f64("delay_ms", ECHO_DELAY_MS);
            tap_delay(
                &mut processed,
                sample_rate,
                delay_ms,
                0.4 + 0.5 * intensity,
                0.3 + 0.6 * intensity,
            );
        }
        EffectKind::Delay => {
            let delay_ms = effect.param_f64("delay_ms", DELAY_DELAY_MS);
            tap_delay(
                &mut processed,
                sample_rate,
                delay_ms,
                0.5 + 0.4 * intensity,
                0.3 + 0.5 * intensity,
            );
        }
        EffectKind::Reverb => reverb(&mut processed, sample_rate, intensity),
        EffectKind::Gate => gate(&mut processed, sample_rate, intensity),
        EffectKind::Flanger => flanger(&mut processed, sample_rate, intensity),
        EffectKind::EqSweep => eq_sweep(&mut processed, sample_rate, intensity),
        EffectKind::Scratch => scratch(&mut processed, sample_rate, intensity),
    }

    if processed.iter().all(|s| s.is_finite()) {
        buffer.copy_from_slice(&processed);
        true
    } else {
        warn!(
            effect = effect.kind.as_str(),
            "Effect produced non-finite samples, skipping"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixtape_common::set::TransitionEffect;

    fn test_segment(seconds: f64) -> Vec<f32> {
        let frames = (seconds * 44100.0) as usize;
        let mut buf = Vec::with_capacity(frames * 2);
        for n in 0..frames {
            let v = (2.0 * std::f64::consts::PI * 440.0 * n as f64 / 44100.0).sin() as f32 * 0.5;
            buf.push(v);
            buf.push(v);
        }
        buf
    }

    #[test]
    fn test_every_kind_applies_cleanly() {
        let kinds = [
            EffectKind::FilterSweep,
            EffectKind::Echo,
            EffectKind::Reverb,
            EffectKind::Delay,
            EffectKind::Gate,
            EffectKind::Flanger,
            EffectKind::EqSweep,
            EffectKind::Scratch,
        ];
        for kind in kinds {
            let effect = TransitionEffect::new(kind, 0.0, 2.0, 0.5);
            let mut buffer = test_segment(2.0);
            assert!(
                apply(&effect, &mut buffer, 44100),
                "{} failed to apply",
                kind.as_str()
            );
            assert!(buffer.iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn test_effects_change_the_signal() {
        for kind in [EffectKind::Echo, EffectKind::Gate, EffectKind::FilterSweep] {
            let effect = TransitionEffect::new(kind, 0.0, 2.0, 0.8);
            let original = test_segment(2.0);
            let mut buffer = original.clone();
            apply(&effect, &mut buffer, 44100);
            let diff: f64 = buffer
                .iter()
                .zip(&original)
                .map(|(a, b)| (a - b).abs() as f64)
                .sum::<f64>()
                / buffer.len() as f64;
            assert!(diff > 1e-4, "{} left the signal untouched", kind.as_str());
        }
    }

    #[test]
    fn test_deterministic() {
        let effect = TransitionEffect::new(EffectKind::Scratch, 0.0, 2.0, 0.6);
        let mut first = test_segment(2.0);
        let mut second = test_segment(2.0);
        apply(&effect, &mut first, 44100);
        apply(&effect, &mut second, 44100);
        assert_eq!(first, second);
    }

    #[test]
    fn test_tiny_segment_is_noop() {
        let effect = TransitionEffect::new(EffectKind::Reverb, 0.0, 1.0, 0.5);
        let mut buffer = vec![0.5f32, 0.5];
        assert!(apply(&effect, &mut buffer, 44100));
        assert_eq!(buffer, vec![0.5, 0.5]);
    }
}
