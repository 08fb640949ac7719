//! Audio decoding using symphonia
//!
//! Decodes the common compressed formats (MP3, FLAC, AAC, Vorbis, WAV) to
//! interleaved f32 PCM at the source sample rate. The renderer always
//! decodes a file from the start; segment extraction happens afterwards in
//! sample space, which keeps positioning exact for every codec.

use crate::error::{RenderError, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoded PCM audio at the source rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples, `channels` per frame
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Convert to interleaved stereo.
    ///
    /// Mono is duplicated to both channels; sources with more than two
    /// channels keep the first two.
    pub fn into_stereo(self) -> DecodedAudio {
        match self.channels {
            2 => self,
            1 => {
                let mut stereo = Vec::with_capacity(self.samples.len() * 2);
                for sample in &self.samples {
                    stereo.push(*sample);
                    stereo.push(*sample);
                }
                DecodedAudio {
                    samples: stereo,
                    sample_rate: self.sample_rate,
                    channels: 2,
                }
            }
            n => {
                let n = n as usize;
                let frames = self.samples.len() / n;
                let mut stereo = Vec::with_capacity(frames * 2);
                for frame in 0..frames {
                    stereo.push(self.samples[frame * n]);
                    stereo.push(self.samples[frame * n + 1]);
                }
                DecodedAudio {
                    samples: stereo,
                    sample_rate: self.sample_rate,
                    channels: 2,
                }
            }
        }
    }
}

/// Audio file decoder.
pub struct AudioDecoder;

impl AudioDecoder {
    /// Decode an entire audio file to interleaved f32 PCM.
    ///
    /// # Errors
    /// - File cannot be opened
    /// - Format cannot be probed or contains no audio track
    /// - Decoder construction fails
    pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
        debug!("Decoding file: {}", path.display());

        let file = std::fs::File::open(path).map_err(|e| {
            RenderError::Decode(format!("Failed to open {}: {e}", path.display()))
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Let the extension hint the probe
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
            .map_err(|e| RenderError::Decode(format!("Failed to probe format: {e}")))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| RenderError::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| RenderError::Decode("Sample rate not found".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| RenderError::Decode("Channel count not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| RenderError::Decode(format!("Failed to create decoder: {e}")))?;

        let mut samples = Vec::new();
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
                    // The sample buffer converts any source format to
                    // interleaved f32 in one copy
                    if sample_buf.is_none() {
                        let spec = *decoded.spec();
                        sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                    }
                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buf.samples());
                    }
                }
                Err(e) => {
                    warn!("Decode error in {}: {}", path.display(), e);
                    continue;
                }
            }
        }

        if samples.is_empty() {
            return Err(RenderError::Decode(format!(
                "No samples decoded from {}",
                path.display()
            )));
        }

        debug!(
            "Decoded {} frames at {}Hz, {} channels",
            samples.len() / channels as usize,
            sample_rate,
            channels
        );

        Ok(DecodedAudio {
            samples,
            sample_rate,
            channels,
        })
    }
}
