//! Analyzed track data model
//!
//! The stored result of track analysis: rhythm (BPM + beat grid), harmony
//! (key + Camelot notation), energy, structural segments, and hot cues.
//! Records are shared-read and written only by analysis workers.

use crate::camelot::CamelotKey;
use serde::{Deserialize, Serialize};

/// Hot cue limit enforced by DJ software convention
pub const MAX_HOT_CUES: usize = 8;

/// Scale of a detected musical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScale {
    Major,
    Minor,
    Unknown,
}

impl Default for KeyScale {
    fn default() -> Self {
        KeyScale::Unknown
    }
}

/// Coarse energy classification for a whole track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyProfile {
    Low,
    Medium,
    High,
    Dynamic,
}

impl Default for EnergyProfile {
    fn default() -> Self {
        EnergyProfile::Medium
    }
}

/// Structural segment classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Intro,
    Verse,
    Chorus,
    Bridge,
    Outro,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Intro => "intro",
            SegmentKind::Verse => "verse",
            SegmentKind::Chorus => "chorus",
            SegmentKind::Bridge => "bridge",
            SegmentKind::Outro => "outro",
        }
    }
}

/// A labeled time span within a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSegment {
    /// Segment start in seconds
    pub start: f64,
    /// Segment end in seconds
    pub end: f64,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    /// Mean spectral energy of the segment (unnormalized)
    pub energy: f64,
}

/// Hot cue marker type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueKind {
    Cue,
    Loop,
    Phrase,
}

/// A named, colored, time-stamped marker within a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotCue {
    pub name: String,
    /// Position in seconds from file start
    pub time: f64,
    /// Display color, `#RRGGBB`
    pub color: String,
    #[serde(rename = "type")]
    pub kind: CueKind,
    /// Slot index, 0-based, stable after truncation to [`MAX_HOT_CUES`]
    pub index: usize,
}

/// Hot cue display color for a structural label.
///
/// `drop` and `buildup` never come out of segment classification but are
/// accepted from imported cue data.
pub fn cue_color(label: &str) -> &'static str {
    match label {
        "intro" => "#00FF00",
        "verse" => "#0080FF",
        "chorus" => "#FF0000",
        "bridge" => "#FF00FF",
        "outro" => "#FFFF00",
        "drop" => "#FF8000",
        "buildup" => "#00FFFF",
        _ => "#FFFFFF",
    }
}

/// A fully analyzed track record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque locator, unique key into the library store
    pub filepath: String,
    /// Hex MD5 of the first and last 8 KiB of the file
    pub file_hash: String,
    /// File mtime, seconds since epoch
    pub last_modified: i64,

    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    /// Duration in seconds
    pub duration: f64,

    /// Beats per minute, folded into [60, 200]
    pub bpm: f64,
    /// Beat onset times in seconds, strictly increasing
    pub beat_times: Vec<f64>,

    /// Detected pitch class ("A", "F#", ...) or "Unknown"
    pub key: String,
    pub scale: KeyScale,
    pub camelot_key: Option<CamelotKey>,
    /// Key detection strength, 0-1
    pub key_confidence: f64,

    /// Overall energy, 0-1
    pub energy_level: f64,
    pub energy_profile: EnergyProfile,

    pub structure: Vec<StructureSegment>,
    pub hot_cues: Vec<HotCue>,

    /// Bumped to force re-analysis of stored records
    pub analysis_version: i64,
}

impl Track {
    /// Validate the record invariants.
    ///
    /// Checked after analysis and before upsert; a violation here is an
    /// analyzer bug, not bad input.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.bpm > 0.0 && self.bpm < 300.0) {
            return Err(format!("bpm out of range: {}", self.bpm));
        }
        if let Some(&first) = self.beat_times.first() {
            if first < 0.0 {
                return Err(format!("negative first beat: {first}"));
            }
        }
        for pair in self.beat_times.windows(2) {
            if pair[0] >= pair[1] {
                return Err(format!(
                    "beat times not strictly increasing: {} >= {}",
                    pair[0], pair[1]
                ));
            }
        }
        if let Some(&last) = self.beat_times.last() {
            if last > self.duration + 1e-6 {
                return Err(format!(
                    "last beat {last} past duration {}",
                    self.duration
                ));
            }
        }
        if self.hot_cues.len() > MAX_HOT_CUES {
            return Err(format!("too many hot cues: {}", self.hot_cues.len()));
        }
        for cue in &self.hot_cues {
            if cue.time < 0.0 || cue.time > self.duration + 1e-6 {
                return Err(format!("hot cue '{}' at {} outside track", cue.name, cue.time));
            }
        }
        // Segments must tile [0, duration] without overlap
        for pair in self.structure.windows(2) {
            if (pair[0].end - pair[1].start).abs() > 1e-3 {
                return Err(format!(
                    "segment gap/overlap at {} vs {}",
                    pair[0].end, pair[1].start
                ));
            }
        }
        if let (Some(first), Some(last)) = (self.structure.first(), self.structure.last()) {
            if first.start.abs() > 1e-3 || (last.end - self.duration).abs() > 0.5 {
                return Err("segments do not cover track".to_string());
            }
        }
        Ok(())
    }

    /// Find a hot cue by (case-insensitive) name prefix.
    pub fn find_cue(&self, prefix: &str) -> Option<&HotCue> {
        let prefix = prefix.to_lowercase();
        self.hot_cues
            .iter()
            .find(|c| c.name.to_lowercase().starts_with(&prefix))
    }
}
