//! Structural segmentation
//!
//! Beat-synchronous chroma vectors are clustered bottom-up: every beat
//! starts as its own segment and the most similar adjacent pair merges
//! until ≈15 segments remain. Segments are labeled by position and by
//! energy relative to the median segment.

use super::stft::{frame_centroid, frame_chroma, magnitude_spectrogram, HOP};
use mixtape_common::track::{SegmentKind, StructureSegment};

/// Agglomerative merge target
const TARGET_SEGMENTS: usize = 15;

/// Energy thresholds for classification, relative to the median segment
const CHORUS_RATIO: f64 = 1.5;
const BRIDGE_RATIO: f64 = 0.8;

/// Segment a track into labeled structural spans covering [0, duration].
pub fn analyze_structure(
    samples: &[f32],
    sample_rate: u32,
    beat_times: &[f64],
    duration: f64,
) -> Vec<StructureSegment> {
    let frames = magnitude_spectrogram(samples);
    if frames.is_empty() || duration <= 0.0 {
        return vec![StructureSegment {
            start: 0.0,
            end: duration.max(0.0),
            kind: SegmentKind::Verse,
            energy: 0.0,
        }];
    }

    let frame_secs = HOP as f64 / sample_rate as f64;
    let nyquist = sample_rate as f64 / 2.0;

    // Per-frame features
    let chroma: Vec<[f32; 12]> = frames
        .iter()
        .map(|frame| frame_chroma(frame, sample_rate))
        .collect();
    let centroid: Vec<f64> = frames
        .iter()
        .map(|frame| frame_centroid(frame, sample_rate) / nyquist)
        .collect();

    // Beat-synchronous aggregation; a regular 1-second grid stands in when
    // the beat grid is too sparse to segment over.
    let grid: Vec<f64> = if beat_times.len() >= 8 {
        beat_times.to_vec()
    } else {
        (0..duration.floor() as usize).map(|s| s as f64).collect()
    };
    if grid.len() < 2 {
        return vec![StructureSegment {
            start: 0.0,
            end: duration,
            kind: SegmentKind::Verse,
            energy: mean(&centroid),
        }];
    }

    let mut units: Vec<Unit> = Vec::with_capacity(grid.len());
    for (i, &start) in grid.iter().enumerate() {
        let end = grid.get(i + 1).copied().unwrap_or(duration);
        let frame_lo = ((start / frame_secs) as usize).min(chroma.len() - 1);
        let frame_hi = ((end / frame_secs) as usize).clamp(frame_lo + 1, chroma.len());

        let mut mean_chroma = [0.0f64; 12];
        for frame in &chroma[frame_lo..frame_hi] {
            for (acc, &v) in mean_chroma.iter_mut().zip(frame) {
                *acc += v as f64;
            }
        }
        let span = (frame_hi - frame_lo) as f64;
        for v in &mut mean_chroma {
            *v /= span;
        }

        units.push(Unit {
            start,
            end,
            chroma: mean_chroma,
            energy: mean(&centroid[frame_lo..frame_hi]),
        });
    }

    // Bottom-up agglomerative merging of adjacent units
    while units.len() > TARGET_SEGMENTS {
        let mut best_idx = 0;
        let mut best_sim = f64::MIN;
        for i in 0..units.len() - 1 {
            let sim = cosine(&units[i].chroma, &units[i + 1].chroma);
            if sim > best_sim {
                best_sim = sim;
                best_idx = i;
            }
        }
        let absorbed = units.remove(best_idx + 1);
        units[best_idx].merge(absorbed);
    }

    // Classification relative to the median segment energy
    let mut energies: Vec<f64> = units.iter().map(|u| u.energy).collect();
    energies.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = energies[energies.len() / 2].max(1e-12);

    let last = units.len() - 1;
    let mut segments: Vec<StructureSegment> = units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            let kind = if i == 0 {
                SegmentKind::Intro
            } else if i == last {
                SegmentKind::Outro
            } else if unit.energy > median * CHORUS_RATIO {
                SegmentKind::Chorus
            } else if unit.energy < median * BRIDGE_RATIO {
                SegmentKind::Bridge
            } else {
                SegmentKind::Verse
            };
            StructureSegment {
                start: unit.start,
                end: unit.end,
                kind,
                energy: unit.energy,
            }
        })
        .collect();

    // Force exact coverage of [0, duration]
    segments.first_mut().unwrap().start = 0.0;
    segments.last_mut().unwrap().end = duration;

    segments
}

struct Unit {
    start: f64,
    end: f64,
    chroma: [f64; 12],
    energy: f64,
}

impl Unit {
    /// Merge a right neighbor, weighting features by span length.
    fn merge(&mut self, other: Unit) {
        let w_self = (self.end - self.start).max(1e-9);
        let w_other = (other.end - other.start).max(1e-9);
        let total = w_self + w_other;
        for (a, b) in self.chroma.iter_mut().zip(other.chroma) {
            *a = (*a * w_self + b * w_other) / total;
        }
        self.energy = (self.energy * w_self + other.energy * w_other) / total;
        self.end = other.end;
    }
}

fn cosine(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three sections with different harmonic content and loudness
    fn sectioned_signal(sample_rate: u32) -> (Vec<f32>, f64) {
        let section_secs = 10.0;
        let mut samples = Vec::new();
        for (freq, amp) in [(220.0, 0.2), (440.0, 0.8), (330.0, 0.3)] {
            let frames = (section_secs * sample_rate as f64) as usize;
            for n in 0..frames {
                let t = n as f64 / sample_rate as f64;
                samples.push(((2.0 * std::f64::consts::PI * freq * t).sin() * amp) as f32);
            }
        }
        (samples, section_secs * 3.0)
    }

    #[test]
    fn test_segments_cover_duration() {
        let sample_rate = 22050;
        let (samples, duration) = sectioned_signal(sample_rate);
        let beats: Vec<f64> = (0..60).map(|i| i as f64 * 0.5).collect();
        let segments = analyze_structure(&samples, sample_rate, &beats, duration);

        assert!(!segments.is_empty());
        assert!(segments.len() <= TARGET_SEGMENTS);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments.last().unwrap().end, duration);
        for pair in segments.windows(2) {
            assert!((pair[0].end - pair[1].start).abs() < 1e-9);
        }
    }

    #[test]
    fn test_first_and_last_labels() {
        let sample_rate = 22050;
        let (samples, duration) = sectioned_signal(sample_rate);
        let beats: Vec<f64> = (0..60).map(|i| i as f64 * 0.5).collect();
        let segments = analyze_structure(&samples, sample_rate, &beats, duration);

        assert_eq!(segments[0].kind, SegmentKind::Intro);
        assert_eq!(segments.last().unwrap().kind, SegmentKind::Outro);
    }

    #[test]
    fn test_sparse_beats_fall_back_to_grid() {
        let sample_rate = 22050;
        let (samples, duration) = sectioned_signal(sample_rate);
        let segments = analyze_structure(&samples, sample_rate, &[0.0, 1.0], duration);
        assert!(!segments.is_empty());
        assert_eq!(segments.last().unwrap().end, duration);
    }

    #[test]
    fn test_empty_input_single_segment() {
        let segments = analyze_structure(&[], 22050, &[], 0.0);
        assert_eq!(segments.len(), 1);
    }
}
