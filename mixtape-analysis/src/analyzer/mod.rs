//! Track analysis engine
//!
//! Produces a complete analyzed [`Track`] record from an audio file:
//! beat grid, key, energy, structure, and hot cues. Analysis is pure with
//! respect to the file contents; re-running on an unchanged file yields an
//! identical record.

pub mod beat;
pub mod cues;
pub mod energy;
pub mod key;
pub mod streaming;
pub mod structure;
mod stft;

use crate::decode::decode_for_analysis;
use crate::error::{AnalysisError, Result};
use mixtape_common::camelot::CamelotKey;
use mixtape_common::track::{KeyScale, Track};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

pub use streaming::{ChunkAnalysis, StreamingAnalyzer};

/// Bumped to force re-analysis of stored records
pub const ANALYSIS_VERSION: i64 = 1;

/// Minimum analyzable track length in seconds
pub const MIN_TRACK_SECS: f64 = 10.0;

/// Fingerprint reads this much from each end of the file
const FINGERPRINT_SPAN: usize = 8 * 1024;

/// Stored and current mtimes may differ by this much without forcing
/// re-analysis (filesystem timestamp granularity)
const MTIME_TOLERANCE_SECS: i64 = 1;

/// The track analysis engine.
///
/// Stateless and cheap to construct; one instance is shared by all queue
/// workers.
#[derive(Debug, Clone, Default)]
pub struct TrackAnalyzer;

impl TrackAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze an audio file into a complete track record.
    ///
    /// Key detection failure is non-fatal: the unknown-key defaults are
    /// substituted and analysis proceeds. Decode failure or a too-short
    /// file is an error.
    pub fn analyze(&self, path: &Path) -> Result<Track> {
        info!(path = %path.display(), "Analyzing track");

        let file_hash = fingerprint(path)?;
        let last_modified = file_mtime(path)?;

        let audio = decode_for_analysis(path)?;
        if audio.duration < MIN_TRACK_SECS {
            return Err(AnalysisError::TooShort {
                seconds: audio.duration,
            });
        }

        let beats = beat::track_beats(&audio.samples, crate::ANALYSIS_SAMPLE_RATE);
        debug!(bpm = beats.bpm, beats = beats.beat_times.len(), "Beat tracking done");

        // Key detection failure substitutes defaults rather than failing
        // the whole analysis
        let (key_name, scale, key_confidence) =
            match key::detect_key(&audio.samples, crate::ANALYSIS_SAMPLE_RATE) {
                Some(detected) => (detected.pitch_class, detected.scale, detected.strength),
                None => {
                    warn!(path = %path.display(), "Key detection failed, storing unknown key");
                    ("Unknown".to_string(), KeyScale::Unknown, 0.0)
                }
            };
        let camelot_key = CamelotKey::from_key(&key_name, scale);

        let energy = energy::analyze_energy(&audio.samples);

        let structure = structure::analyze_structure(
            &audio.samples,
            crate::ANALYSIS_SAMPLE_RATE,
            &beats.beat_times,
            audio.duration,
        );

        let hot_cues = cues::generate_hot_cues(&structure, &beats.beat_times, audio.duration);

        let track = Track {
            filepath: path.display().to_string(),
            file_hash,
            last_modified,
            // Tag extraction is an external concern; the file stem stands
            // in until richer metadata is merged by the caller
            title: path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string),
            artist: None,
            album: None,
            genre: None,
            year: None,
            duration: audio.duration,
            bpm: beats.bpm,
            beat_times: beats.beat_times,
            key: key_name,
            scale,
            camelot_key,
            key_confidence,
            energy_level: energy.level,
            energy_profile: energy.profile,
            structure,
            hot_cues,
            analysis_version: ANALYSIS_VERSION,
        };

        if let Err(violation) = track.validate() {
            return Err(AnalysisError::InvalidRecord(violation));
        }

        info!(
            path = %path.display(),
            bpm = track.bpm,
            key = %track.key,
            energy = track.energy_level,
            cues = track.hot_cues.len(),
            "Analysis complete"
        );
        Ok(track)
    }

    /// Decide whether a file needs (re-)analysis against its stored record.
    pub fn needs_analysis(&self, path: &Path, stored: Option<&Track>) -> bool {
        let Some(record) = stored else {
            return true;
        };

        if record.analysis_version < ANALYSIS_VERSION {
            return true;
        }

        match file_mtime(path) {
            Ok(mtime) if (mtime - record.last_modified).abs() > MTIME_TOLERANCE_SECS => {
                return true;
            }
            Err(_) => return true,
            _ => {}
        }

        match fingerprint(path) {
            Ok(hash) => hash != record.file_hash,
            Err(_) => true,
        }
    }
}

/// Cheap content fingerprint: hex MD5 over the first and last 8 KiB.
pub fn fingerprint(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();

    let head_len = (len as usize).min(FINGERPRINT_SPAN);
    let mut head = vec![0u8; head_len];
    file.read_exact(&mut head)?;

    let mut context = md5::Context::new();
    context.consume(&head);

    if len > FINGERPRINT_SPAN as u64 {
        let tail_start = len - FINGERPRINT_SPAN as u64;
        file.seek(SeekFrom::Start(tail_start))?;
        let mut tail = vec![0u8; FINGERPRINT_SPAN];
        file.read_exact(&mut tail)?;
        context.consume(&tail);
    }

    Ok(format!("{:x}", context.compute()))
}

/// File mtime as seconds since the epoch.
fn file_mtime(path: &Path) -> Result<i64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0))
}
