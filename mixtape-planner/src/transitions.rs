//! Transition validation and repair
//!
//! The oracle's transition plans arrive as loosely-typed JSON. Everything
//! is clamped and defaulted here so the renderer only ever sees well-formed
//! plans: durations within [4, 60] s, at most two effects, every effect
//! carrying all four required fields, and intensities kept in the smooth
//! [0.2, 0.5] band unless the transition is explicitly adventurous
//! (scratch cuts and effects transitions).

use crate::oracle::{OracleEffect, OracleTransition};
use mixtape_common::fade_curves::CrossfadeCurve;
use mixtape_common::set::{
    EffectKind, RiskLevel, TransitionEffect, TransitionType, MAX_TRANSITION_EFFECTS,
    MAX_TRANSITION_SECS, MIN_TRANSITION_SECS,
};
use tracing::debug;

/// Intensity band for smooth transitions
const SMOOTH_INTENSITY_MIN: f64 = 0.2;
const SMOOTH_INTENSITY_MAX: f64 = 0.5;

/// Intensity of the default filter sweep injected when the oracle omits
/// effects entirely
const DEFAULT_SWEEP_INTENSITY: f64 = 0.7;

/// A validated transition, not yet placed on the set timeline.
#[derive(Debug, Clone)]
pub struct PlannedTransition {
    pub kind: TransitionType,
    pub crossfade_curve: CrossfadeCurve,
    pub duration: f64,
    pub effects: Vec<TransitionEffect>,
    pub compatibility_score: f64,
    pub risk_level: RiskLevel,
    pub technique_notes: String,
    pub outro_cue: f64,
    pub intro_cue: f64,
}

/// Validate and repair a raw oracle transition.
pub fn validate_transition(raw: OracleTransition) -> PlannedTransition {
    let kind = parse_transition_type(&raw.transition_type);
    let duration = raw
        .crossfade_duration
        .clamp(MIN_TRANSITION_SECS, MAX_TRANSITION_SECS);

    // Intensity stays in the smooth band unless the style is explicitly
    // adventurous
    let free_intensity = matches!(
        kind,
        TransitionType::ScratchCut | TransitionType::EffectsTransition
    );

    let mut effects: Vec<TransitionEffect> = raw
        .effects
        .into_iter()
        .take(MAX_TRANSITION_EFFECTS)
        .map(|raw_effect| repair_effect(raw_effect, free_intensity))
        .collect();

    if effects.is_empty() {
        debug!("Oracle omitted effects, injecting default filter sweep");
        effects.push(TransitionEffect::new(
            EffectKind::FilterSweep,
            0.0,
            duration,
            DEFAULT_SWEEP_INTENSITY,
        ));
    }

    PlannedTransition {
        kind,
        crossfade_curve: CrossfadeCurve::parse(&raw.crossfade_curve)
            .unwrap_or(CrossfadeCurve::SCurve),
        duration,
        effects,
        compatibility_score: raw.compatibility_score.clamp(0.0, 1.0),
        risk_level: parse_risk(&raw.risk_level),
        technique_notes: raw.technique_notes,
        outro_cue: raw.outro_cue.unwrap_or(0.9).clamp(0.0, 1.0),
        intro_cue: raw.intro_cue.unwrap_or(0.1).clamp(0.0, 1.0),
    }
}

/// The deterministic plan used when the oracle cannot produce one:
/// a smooth s-curve blend with a single filter sweep.
pub fn fallback_transition() -> PlannedTransition {
    validate_transition(OracleTransition::default())
}

fn repair_effect(raw: OracleEffect, free_intensity: bool) -> TransitionEffect {
    let kind = parse_effect_kind(&raw.kind);
    let intensity = raw.intensity.clamp(0.0, 1.0);
    let intensity = if free_intensity {
        intensity
    } else {
        intensity.clamp(SMOOTH_INTENSITY_MIN, SMOOTH_INTENSITY_MAX)
    };

    TransitionEffect {
        kind,
        start_at: raw.start_at.max(0.0),
        duration: raw.duration.max(0.1),
        intensity,
        parameters: raw.parameters,
    }
}

fn parse_transition_type(s: &str) -> TransitionType {
    match s.to_lowercase().as_str() {
        "smooth_blend" | "smooth_fade" => TransitionType::SmoothBlend,
        "quick_cut" | "creative_cut" => TransitionType::QuickCut,
        "effects_transition" | "energy_shift" => TransitionType::EffectsTransition,
        "beatmatch_blend" | "beatmatch" => TransitionType::BeatmatchBlend,
        "scratch_cut" => TransitionType::ScratchCut,
        "fade_to_silence" | "breakdown" => TransitionType::FadeToSilence,
        _ => TransitionType::SmoothBlend,
    }
}

fn parse_effect_kind(s: &str) -> EffectKind {
    match s.to_lowercase().as_str() {
        "filter" | "filter_sweep" => EffectKind::FilterSweep,
        "echo" => EffectKind::Echo,
        "reverb" => EffectKind::Reverb,
        "delay" => EffectKind::Delay,
        "gate" => EffectKind::Gate,
        "flanger" => EffectKind::Flanger,
        "eq_sweep" => EffectKind::EqSweep,
        "scratch" => EffectKind::Scratch,
        _ => EffectKind::FilterSweep,
    }
}

fn parse_risk(s: &str) -> RiskLevel {
    match s.to_lowercase().as_str() {
        "moderate" => RiskLevel::Moderate,
        "adventurous" => RiskLevel::Adventurous,
        _ => RiskLevel::Safe,
    }
}
