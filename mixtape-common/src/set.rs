//! DJ set data model
//!
//! Value types produced by the planner and consumed by the renderer.
//! A set is immutable after emission: timed tracks on alternating virtual
//! decks joined by transitions with crossfade curves and effect schedules.

use crate::fade_curves::CrossfadeCurve;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Transition duration bounds in seconds
pub const MIN_TRANSITION_SECS: f64 = 4.0;
pub const MAX_TRANSITION_SECS: f64 = 60.0;

/// Maximum scheduled effects on one transition
pub const MAX_TRANSITION_EFFECTS: usize = 2;

/// Virtual deck identifier.
///
/// The planner currently alternates A and B; C and D exist so a key-aware
/// assigner can be added without a model change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckId {
    A,
    B,
    C,
    D,
}

impl DeckId {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeckId::A => "A",
            DeckId::B => "B",
            DeckId::C => "C",
            DeckId::D => "D",
        }
    }
}

/// Requested energy shape across the set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyPattern {
    Building,
    Cooling,
    PeakTime,
    Wave,
}

impl Default for EnergyPattern {
    fn default() -> Self {
        EnergyPattern::Wave
    }
}

/// Overall mixing approach for a set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixingStyle {
    Smooth,
    Aggressive,
    Creative,
}

impl Default for MixingStyle {
    fn default() -> Self {
        MixingStyle::Smooth
    }
}

/// Risk classification the oracle attaches to a transition plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Moderate,
    Adventurous,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Safe
    }
}

/// Transition style between two tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    SmoothBlend,
    QuickCut,
    EffectsTransition,
    BeatmatchBlend,
    ScratchCut,
    FadeToSilence,
}

impl Default for TransitionType {
    fn default() -> Self {
        TransitionType::SmoothBlend
    }
}

/// DSP effect kinds available during transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    #[serde(alias = "filter")]
    FilterSweep,
    Echo,
    Reverb,
    Delay,
    Gate,
    Flanger,
    EqSweep,
    Scratch,
}

impl EffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::FilterSweep => "filter_sweep",
            EffectKind::Echo => "echo",
            EffectKind::Reverb => "reverb",
            EffectKind::Delay => "delay",
            EffectKind::Gate => "gate",
            EffectKind::Flanger => "flanger",
            EffectKind::EqSweep => "eq_sweep",
            EffectKind::Scratch => "scratch",
        }
    }
}

/// One scheduled effect within a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEffect {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    /// Seconds from transition start, >= 0
    pub start_at: f64,
    /// Effect duration in seconds, > 0
    pub duration: f64,
    /// Effect intensity, 0-1
    pub intensity: f64,
    /// Type-specific named values, e.g. `delay_ms` for echo/delay
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
}

impl TransitionEffect {
    pub fn new(kind: EffectKind, start_at: f64, duration: f64, intensity: f64) -> Self {
        Self {
            kind,
            start_at,
            duration,
            intensity,
            parameters: serde_json::Map::new(),
        }
    }

    /// Fetch a numeric parameter with a default.
    pub fn param_f64(&self, name: &str, default: f64) -> f64 {
        self.parameters
            .get(name)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }
}

/// A fully planned transition between two adjacent set tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPlan {
    /// 1-based order of the outgoing track
    pub from_order: u32,
    /// 1-based order of the incoming track
    pub to_order: u32,
    /// Absolute seconds in the set where the crossfade begins
    pub start_time: f64,
    /// Crossfade duration in seconds, within [4, 60]
    pub duration: f64,
    #[serde(rename = "type")]
    pub kind: TransitionType,
    pub crossfade_curve: CrossfadeCurve,
    /// At most [`MAX_TRANSITION_EFFECTS`] scheduled effects
    pub effects: Vec<TransitionEffect>,
    /// Fraction of the outgoing track where its outro begins
    pub outro_cue: f64,
    /// Fraction of the incoming track where its intro begins
    pub intro_cue: f64,
    pub compatibility_score: f64,
    pub risk_level: RiskLevel,
    /// Professional mixing technique notes from the oracle
    #[serde(default)]
    pub technique_notes: String,
}

/// One timed track within a set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DJSetTrack {
    /// 1-based position in the set
    pub order: u32,
    pub filepath: String,
    pub deck: DeckId,

    /// Absolute start in the set, seconds
    pub start_time: f64,
    /// Absolute end in the set, seconds
    pub end_time: f64,
    pub fade_in_time: f64,
    pub fade_out_time: f64,

    /// Segment start within the source file, seconds
    pub hot_cue_in_offset: f64,
    /// Segment end within the source file, seconds
    pub hot_cue_out_offset: f64,

    /// Linear gain multiplier
    pub gain_adjust: f64,
    /// Per-band EQ adjustments, each -1..1 (band scaled by 1 + value)
    pub eq_low: f64,
    pub eq_mid: f64,
    pub eq_high: f64,
    /// Tempo adjustment, -0.5..0.5
    pub tempo_adjust: f64,

    // Display metadata carried from the analyzed record
    pub title: Option<String>,
    pub artist: Option<String>,
    pub bpm: f64,
    pub key: Option<String>,
    pub energy_level: f64,
    #[serde(default)]
    pub mixing_note: String,
}

impl DJSetTrack {
    /// Planned playing length within the set.
    pub fn planned_duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Length of the source segment to extract.
    pub fn segment_duration(&self) -> f64 {
        self.hot_cue_out_offset - self.hot_cue_in_offset
    }
}

/// A notable moment in the set, from the oracle's playlist finalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMoment {
    pub position: u32,
    pub description: String,
}

/// A complete, fully timed DJ set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DJSet {
    pub id: Uuid,
    pub name: String,
    /// The vibe description this set was planned from
    pub vibe: String,
    /// Total length in seconds (max track end time)
    pub total_duration: f64,
    pub energy_pattern: EnergyPattern,
    /// Ordered by `order`
    pub tracks: Vec<DJSetTrack>,
    /// Ordered by `start_time`; transition i joins tracks i and i+1
    pub transitions: Vec<TransitionPlan>,
    /// Energy level per track position, 0-1
    pub energy_graph: Vec<f64>,
    #[serde(default)]
    pub key_moments: Vec<KeyMoment>,
    #[serde(default)]
    pub mixing_style: MixingStyle,
}

impl DJSet {
    /// Validate the structural invariants of a planned set.
    pub fn validate(&self) -> Result<(), String> {
        const EPS: f64 = 1e-3;

        if !self.tracks.is_empty() && self.transitions.len() != self.tracks.len() - 1 {
            return Err(format!(
                "{} transitions for {} tracks",
                self.transitions.len(),
                self.tracks.len()
            ));
        }

        for (i, track) in self.tracks.iter().enumerate() {
            if track.order != (i + 1) as u32 {
                return Err(format!("track {} has order {}", i + 1, track.order));
            }
            if track.end_time <= track.start_time {
                return Err(format!("track {} has non-positive duration", track.order));
            }
            if track.segment_duration() <= 0.0 {
                return Err(format!("track {} has empty hot cue range", track.order));
            }
        }

        for (i, transition) in self.transitions.iter().enumerate() {
            let from = &self.tracks[i];
            let to = &self.tracks[i + 1];

            if transition.from_order != from.order || transition.to_order != to.order {
                return Err(format!("transition {i} joins wrong tracks"));
            }
            if !(MIN_TRANSITION_SECS - EPS..=MAX_TRANSITION_SECS + EPS)
                .contains(&transition.duration)
            {
                return Err(format!(
                    "transition {i} duration {} outside [{MIN_TRANSITION_SECS}, {MAX_TRANSITION_SECS}]",
                    transition.duration
                ));
            }
            if transition.effects.len() > MAX_TRANSITION_EFFECTS {
                return Err(format!("transition {i} has {} effects", transition.effects.len()));
            }
            for effect in &transition.effects {
                if effect.start_at < 0.0 || effect.duration <= 0.0 {
                    return Err(format!("transition {i} has invalid effect timing"));
                }
                if !(0.0..=1.0).contains(&effect.intensity) {
                    return Err(format!("transition {i} effect intensity out of range"));
                }
            }
            // The crossfade window must lie inside the overlap of both tracks
            if from.end_time + EPS < transition.start_time + transition.duration {
                return Err(format!("transition {i} outlives outgoing track"));
            }
            if to.start_time > transition.start_time + EPS {
                return Err(format!("transition {i} starts before incoming track"));
            }
            // Adjacent tracks must sit on different decks
            if from.deck == to.deck {
                return Err(format!(
                    "tracks {} and {} share deck {}",
                    from.order,
                    to.order,
                    from.deck.as_str()
                ));
            }
        }

        Ok(())
    }
}
