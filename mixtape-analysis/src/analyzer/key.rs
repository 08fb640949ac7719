//! Musical key detection
//!
//! Correlates the track's mean chroma vector against the Krumhansl-Kessler
//! major and minor key profiles at every rotation. The best-scoring
//! (pitch class, scale) wins; the normalized correlation is the confidence.

use super::stft::{frame_chroma, magnitude_spectrogram};
use mixtape_common::track::KeyScale;

/// Pitch class spellings, index 0 = C, matching the Camelot wheel table
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Krumhansl-Kessler major key profile (tonic first)
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor key profile (tonic first)
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Detected key
#[derive(Debug, Clone)]
pub struct KeyAnalysis {
    /// Pitch class spelling from [`PITCH_CLASSES`]
    pub pitch_class: String,
    pub scale: KeyScale,
    /// Best profile correlation, clamped to [0, 1]
    pub strength: f64,
}

/// Detect the key of a mono buffer.
///
/// Returns `None` when the signal carries no usable harmonic content;
/// the caller substitutes the unknown-key defaults.
pub fn detect_key(samples: &[f32], sample_rate: u32) -> Option<KeyAnalysis> {
    let frames = magnitude_spectrogram(samples);
    if frames.is_empty() {
        return None;
    }

    // Mean chroma over the whole track
    let mut chroma = [0.0f64; 12];
    for frame in &frames {
        let frame_chroma = frame_chroma(frame, sample_rate);
        for (acc, value) in chroma.iter_mut().zip(frame_chroma) {
            *acc += value as f64;
        }
    }
    let total: f64 = chroma.iter().sum();
    if total <= 1e-12 {
        return None;
    }
    for value in &mut chroma {
        *value /= total;
    }

    let mut best: Option<(usize, KeyScale, f64)> = None;
    for tonic in 0..12 {
        for (profile, scale) in [
            (&MAJOR_PROFILE, KeyScale::Major),
            (&MINOR_PROFILE, KeyScale::Minor),
        ] {
            let rotated: Vec<f64> = (0..12).map(|i| profile[(i + 12 - tonic) % 12]).collect();
            let corr = pearson(&chroma, &rotated);
            if best.map_or(true, |(_, _, b)| corr > b) {
                best = Some((tonic, scale, corr));
            }
        }
    }

    let (tonic, scale, corr) = best?;
    Some(KeyAnalysis {
        pitch_class: PITCH_CLASSES[tonic].to_string(),
        scale,
        strength: corr.clamp(0.0, 1.0),
    })
}

/// Pearson correlation between a chroma vector and a key profile.
fn pearson(a: &[f64; 12], b: &[f64]) -> f64 {
    let mean_a: f64 = a.iter().sum::<f64>() / 12.0;
    let mean_b: f64 = b.iter().sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sum of sines at the given MIDI notes
    fn tone_cluster(notes: &[i32], seconds: f64, sample_rate: u32) -> Vec<f32> {
        let total = (seconds * sample_rate as f64) as usize;
        (0..total)
            .map(|n| {
                let t = n as f64 / sample_rate as f64;
                notes
                    .iter()
                    .map(|&note| {
                        let freq = 440.0 * 2f64.powf((note - 69) as f64 / 12.0);
                        (2.0 * std::f64::consts::PI * freq * t).sin() as f32
                    })
                    .sum::<f32>()
                    / notes.len() as f32
            })
            .collect()
    }

    #[test]
    fn test_a_minor_triad() {
        // A3, C4, E4 = A minor
        let samples = tone_cluster(&[57, 60, 64], 3.0, 22050);
        let key = detect_key(&samples, 22050).unwrap();
        assert_eq!(key.pitch_class, "A");
        assert_eq!(key.scale, KeyScale::Minor);
        assert!(key.strength > 0.3, "strength {}", key.strength);
    }

    #[test]
    fn test_c_major_scale() {
        // C major scale, one octave
        let samples = tone_cluster(&[60, 62, 64, 65, 67, 69, 71, 72], 3.0, 22050);
        let key = detect_key(&samples, 22050).unwrap();
        assert_eq!(key.pitch_class, "C");
        assert_eq!(key.scale, KeyScale::Major);
    }

    #[test]
    fn test_silence_returns_none() {
        let samples = vec![0.0f32; 22050 * 2];
        assert!(detect_key(&samples, 22050).is_none());
    }

    #[test]
    fn test_too_short_returns_none() {
        assert!(detect_key(&[0.1f32; 512], 22050).is_none());
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let b: Vec<f64> = a.iter().map(|x| x * 2.0 + 1.0).collect();
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-9);
    }
}
