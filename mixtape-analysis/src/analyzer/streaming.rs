//! Streaming chunked analysis
//!
//! Yields partial results per ~30 s chunk (with 5 s overlap) so callers can
//! surface BPM and energy estimates while a long file is still being
//! processed. The final element carries the full-file key detection, which
//! needs the complete signal. Restartable by constructing a new analyzer;
//! individual chunks are not resumable.

use super::{beat, energy, key, stft};
use crate::decode::decode_for_analysis;
use crate::error::Result;
use crate::ANALYSIS_SAMPLE_RATE;
use mixtape_common::track::KeyScale;
use std::path::Path;

/// Chunk length in seconds
const CHUNK_SECS: f64 = 30.0;
/// Overlap between consecutive chunks in seconds
const OVERLAP_SECS: f64 = 5.0;

/// Partial result for one streamed chunk
#[derive(Debug, Clone)]
pub struct ChunkAnalysis {
    /// 0-based chunk index; the final key-carrying element uses the count
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Per-chunk tempo estimate
    pub bpm_estimate: Option<f64>,
    /// Beat positions in absolute file seconds
    pub beat_positions: Vec<f64>,
    pub energy_level: Option<f64>,
    /// Mean spectral centroid of the chunk in Hz
    pub spectral_centroid: Option<f64>,
    /// Onset positions in absolute file seconds
    pub onset_positions: Vec<f64>,
    /// Full-file key detection, only on the final element
    pub key: Option<(String, KeyScale, f64)>,
    pub is_final: bool,
}

/// Iterator over chunked analysis results.
pub struct StreamingAnalyzer {
    samples: Vec<f32>,
    step: usize,
    chunk_len: usize,
    total_chunks: usize,
    next_chunk: usize,
    final_emitted: bool,
}

impl StreamingAnalyzer {
    /// Open a file for streaming analysis.
    pub fn open(path: &Path) -> Result<Self> {
        let audio = decode_for_analysis(path)?;
        let chunk_len = (CHUNK_SECS * ANALYSIS_SAMPLE_RATE as f64) as usize;
        let step = ((CHUNK_SECS - OVERLAP_SECS) * ANALYSIS_SAMPLE_RATE as f64) as usize;
        let total_chunks = if audio.samples.is_empty() {
            0
        } else {
            audio.samples.len().div_ceil(step)
        };

        Ok(Self {
            samples: audio.samples,
            step,
            chunk_len,
            total_chunks,
            next_chunk: 0,
            final_emitted: false,
        })
    }

    fn analyze_chunk(&self, chunk_index: usize) -> ChunkAnalysis {
        let start = chunk_index * self.step;
        let end = (start + self.chunk_len).min(self.samples.len());
        let chunk = &self.samples[start..end];
        let offset_secs = start as f64 / ANALYSIS_SAMPLE_RATE as f64;

        let beats = beat::track_beats(chunk, ANALYSIS_SAMPLE_RATE);
        let energy = energy::analyze_energy(chunk);

        let frames = stft::magnitude_spectrogram(chunk);
        let centroid = if frames.is_empty() {
            None
        } else {
            Some(
                frames
                    .iter()
                    .map(|f| stft::frame_centroid(f, ANALYSIS_SAMPLE_RATE))
                    .sum::<f64>()
                    / frames.len() as f64,
            )
        };

        // Onsets double as rough cue candidates for realtime consumers
        let onset_positions = onset_times(chunk, offset_secs);

        ChunkAnalysis {
            chunk_index,
            total_chunks: self.total_chunks,
            bpm_estimate: Some(beats.bpm),
            beat_positions: beats.beat_times.iter().map(|t| t + offset_secs).collect(),
            energy_level: Some(energy.level),
            spectral_centroid: centroid,
            onset_positions,
            key: None,
            is_final: false,
        }
    }

    fn final_element(&self) -> ChunkAnalysis {
        let key = key::detect_key(&self.samples, ANALYSIS_SAMPLE_RATE)
            .map(|k| (k.pitch_class, k.scale, k.strength));
        ChunkAnalysis {
            chunk_index: self.total_chunks,
            total_chunks: self.total_chunks,
            bpm_estimate: None,
            beat_positions: Vec::new(),
            energy_level: None,
            spectral_centroid: None,
            onset_positions: Vec::new(),
            key,
            is_final: true,
        }
    }
}

impl Iterator for StreamingAnalyzer {
    type Item = ChunkAnalysis;

    fn next(&mut self) -> Option<ChunkAnalysis> {
        if self.next_chunk < self.total_chunks {
            let result = self.analyze_chunk(self.next_chunk);
            self.next_chunk += 1;
            Some(result)
        } else if !self.final_emitted && self.total_chunks > 0 {
            self.final_emitted = true;
            Some(self.final_element())
        } else {
            None
        }
    }
}

/// Onset peak positions from the spectral-flux envelope, offset to
/// absolute file time.
fn onset_times(chunk: &[f32], offset_secs: f64) -> Vec<f64> {
    let frames = stft::magnitude_spectrogram(chunk);
    if frames.len() < 3 {
        return Vec::new();
    }

    let mut flux = Vec::with_capacity(frames.len());
    flux.push(0.0f32);
    for pair in frames.windows(2) {
        flux.push(
            pair[1]
                .iter()
                .zip(&pair[0])
                .map(|(cur, prev)| (cur - prev).max(0.0))
                .sum(),
        );
    }

    let mean = flux.iter().sum::<f32>() / flux.len() as f32;
    let threshold = mean * 2.0;
    let frame_secs = stft::HOP as f64 / ANALYSIS_SAMPLE_RATE as f64;

    let mut onsets = Vec::new();
    for i in 1..flux.len() - 1 {
        if flux[i] > threshold && flux[i] > flux[i - 1] && flux[i] >= flux[i + 1] {
            onsets.push(offset_secs + i as f64 * frame_secs);
        }
    }
    onsets
}
