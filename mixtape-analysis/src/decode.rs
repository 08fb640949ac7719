//! Mono decoding for feature extraction
//!
//! Analysis runs on mono audio at a fixed 22 050 Hz rate: every feature
//! (onsets, chroma, RMS) is rate-dependent, so decoding normalizes first.
//! Timestamps derived from analysis frames are valid against the original
//! file because resampling preserves wall-clock time.

use crate::error::{AnalysisError, Result};
use crate::ANALYSIS_SAMPLE_RATE;
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Mono audio prepared for analysis
#[derive(Debug, Clone)]
pub struct AnalysisAudio {
    /// Mono samples at [`ANALYSIS_SAMPLE_RATE`]
    pub samples: Vec<f32>,
    /// Duration of the source file in seconds (at the original rate)
    pub duration: f64,
}

/// Decode an audio file to mono at the analysis rate.
pub fn decode_for_analysis(path: &Path) -> Result<AnalysisAudio> {
    let (mono, source_rate) = decode_mono(path)?;
    let duration = mono.len() as f64 / source_rate as f64;
    let samples = resample_mono(mono, source_rate)?;
    debug!(
        path = %path.display(),
        duration,
        samples = samples.len(),
        "Decoded for analysis"
    );
    Ok(AnalysisAudio { samples, duration })
}

/// Decode to mono f32 at the source rate by averaging channels.
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let file = std::fs::File::open(path)
        .map_err(|e| AnalysisError::Decode(format!("Failed to open {}: {e}", path.display())))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AnalysisError::Decode(format!("Failed to probe format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| AnalysisError::Decode("Sample rate not found".to_string()))?;
    let channels = codec_params
        .channels
        .map(|c| c.count())
        .ok_or_else(|| AnalysisError::Decode("Channel count not found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AnalysisError::Decode(format!("Failed to create decoder: {e}")))?;

    let mut mono = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    for frame in buf.samples().chunks_exact(channels) {
                        mono.push(frame.iter().sum::<f32>() / channels as f32);
                    }
                }
            }
            Err(e) => {
                warn!("Decode error in {}: {}", path.display(), e);
                continue;
            }
        }
    }

    if mono.is_empty() {
        return Err(AnalysisError::Decode(format!(
            "No samples decoded from {}",
            path.display()
        )));
    }

    Ok((mono, sample_rate))
}

/// Resample a mono buffer to the analysis rate.
fn resample_mono(samples: Vec<f32>, source_rate: u32) -> Result<Vec<f32>> {
    if source_rate == ANALYSIS_SAMPLE_RATE {
        return Ok(samples);
    }

    let mut resampler = FastFixedIn::<f32>::new(
        ANALYSIS_SAMPLE_RATE as f64 / source_rate as f64,
        1.0,
        PolynomialDegree::Linear,
        samples.len(),
        1,
    )
    .map_err(|e| AnalysisError::Decode(format!("Failed to create resampler: {e}")))?;

    let output = resampler
        .process(&[samples], None)
        .map_err(|e| AnalysisError::Decode(format!("Resampling failed: {e}")))?;

    Ok(output.into_iter().next().unwrap_or_default())
}
