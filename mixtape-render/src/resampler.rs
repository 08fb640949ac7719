//! Audio resampling using rubato
//!
//! Converts decoded audio to the canonical 44.1 kHz rate before mixing.
//! Offline rendering resamples whole tracks in one pass, so the resampler
//! is sized to the full input length rather than streamed in chunks.

use crate::decode::DecodedAudio;
use crate::error::{RenderError, Result};
use crate::SAMPLE_RATE;
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Resample interleaved audio to the canonical output rate.
///
/// Returns the input untouched when it is already at 44.1 kHz.
pub fn resample_to_output_rate(audio: DecodedAudio) -> Result<DecodedAudio> {
    if audio.sample_rate == SAMPLE_RATE {
        return Ok(audio);
    }
    if audio.samples.is_empty() {
        return Ok(DecodedAudio {
            samples: vec![],
            sample_rate: SAMPLE_RATE,
            channels: audio.channels,
        });
    }

    debug!(
        "Resampling {}Hz -> {}Hz ({} channels)",
        audio.sample_rate, SAMPLE_RATE, audio.channels
    );

    let channels = audio.channels as usize;
    let planar_input = deinterleave(&audio.samples, channels);
    let input_frames = planar_input[0].len();

    let mut resampler = FastFixedIn::<f32>::new(
        SAMPLE_RATE as f64 / audio.sample_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        channels,
    )
    .map_err(|e| {
        RenderError::Resample(format!(
            "Failed to create resampler {} -> {}: {e}",
            audio.sample_rate, SAMPLE_RATE
        ))
    })?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| RenderError::Resample(format!("Resampling failed: {e}")))?;

    Ok(DecodedAudio {
        samples: interleave(&planar_output),
        sample_rate: SAMPLE_RATE,
        channels: audio.channels,
    })
}

/// Convert interleaved samples to planar format.
///
/// Input:  [L, R, L, R, ...]
/// Output: [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in 0..frames {
        for (ch, lane) in planar.iter_mut().enumerate() {
            lane.push(samples[frame * channels + ch]);
        }
    }
    planar
}

/// Convert planar samples back to interleaved format.
fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }
    let channels = planar.len();
    let frames = planar[0].len();
    let mut interleaved = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for lane in planar {
            interleaved.push(lane[frame]);
        }
    }
    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave_interleave_round_trip() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let planar = deinterleave(&samples, 2);
        assert_eq!(planar[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(planar[1], vec![2.0, 4.0, 6.0]);
        assert_eq!(interleave(&planar), samples);
    }

    #[test]
    fn test_same_rate_passthrough() {
        let audio = DecodedAudio {
            samples: vec![0.5; 1000],
            sample_rate: SAMPLE_RATE,
            channels: 2,
        };
        let out = resample_to_output_rate(audio.clone()).unwrap();
        assert_eq!(out.samples, audio.samples);
    }

    #[test]
    fn test_resample_changes_length() {
        // One second at 22050 Hz should come out near one second at 44100
        let audio = DecodedAudio {
            samples: vec![0.1; 22050 * 2],
            sample_rate: 22050,
            channels: 2,
        };
        let out = resample_to_output_rate(audio).unwrap();
        assert_eq!(out.sample_rate, SAMPLE_RATE);
        let frames = out.frames();
        assert!(
            (frames as i64 - 44100).unsigned_abs() < 500,
            "expected ~44100 frames, got {frames}"
        );
    }

    #[test]
    fn test_empty_input() {
        let audio = DecodedAudio {
            samples: vec![],
            sample_rate: 48000,
            channels: 2,
        };
        let out = resample_to_output_rate(audio).unwrap();
        assert!(out.samples.is_empty());
        assert_eq!(out.sample_rate, SAMPLE_RATE);
    }
}
