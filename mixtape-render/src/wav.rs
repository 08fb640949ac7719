//! WAV serialization
//!
//! Canonical output format: RIFF/fmt/data chunks, PCM format 1, 2 channels,
//! 44 100 Hz, 16 bits per sample, interleaved little-endian. The renderer
//! always knows the final size, so headers carry exact chunk lengths;
//! `STREAMING_DATA_SIZE` is the reserved size a streaming writer would use
//! when the length is unknown up front.

use crate::{CHANNELS, SAMPLE_RATE};
use std::io::Write;
use std::path::Path;

/// Bytes per sample in the output format
const BYTES_PER_SAMPLE: u32 = 2;

/// Output byte rate: 44100 Hz x 2 channels x 2 bytes
pub const BYTE_RATE: u32 = SAMPLE_RATE * CHANNELS as u32 * BYTES_PER_SAMPLE;

/// Reserved data size for headers written before the length is known:
/// one hour at the output byte rate, capped below u32::MAX.
pub const STREAMING_DATA_SIZE: u32 = {
    let one_hour = BYTE_RATE as u64 * 3600;
    if one_hour > 0xFFFF_FFF0 {
        0xFFFF_FFF0
    } else {
        one_hour as u32
    }
};

/// Build the 44-byte WAV header for a known data size.
pub fn wav_header(data_size: u32) -> [u8; 44] {
    let mut header = [0u8; 44];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&SAMPLE_RATE.to_le_bytes());
    header[28..32].copy_from_slice(&BYTE_RATE.to_le_bytes());
    let block_align = CHANNELS * BYTES_PER_SAMPLE as u16;
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&16u16.to_le_bytes()); // bits per sample

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Convert normalized f32 samples to interleaved 16-bit PCM bytes.
pub fn to_pcm_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Write interleaved stereo f32 samples to a WAV file.
pub fn write_wav(path: &Path, samples: &[f32]) -> std::io::Result<()> {
    let pcm = to_pcm_bytes(samples);
    let mut file = std::fs::File::create(path)?;
    file.write_all(&wav_header(pcm.len() as u32))?;
    file.write_all(&pcm)?;
    file.flush()
}
