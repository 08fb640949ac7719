//! Deterministic DJ set renderer
//!
//! Mixes a planned set into a single stereo buffer in two passes:
//!
//! 1. **Load**: decode each source file, resample to 44.1 kHz stereo,
//!    extract the planned hot-cue segment, pad or trim it to the planned
//!    length, apply per-track gain and 3-band EQ.
//! 2. **Mix**: apply crossfade curves and scheduled effects at each
//!    transition (or 0.5 s edge fades outside transitions), then sum each
//!    processed buffer into the output at its start offset.
//!
//! The output is normalized to a 0.95 peak and serialized as 16-bit WAV.
//! Rendering the same set against the same source bytes is bit-identical.

use crate::decode::AudioDecoder;
use crate::effects;
use crate::eq::ThreeBandEq;
use crate::error::{RenderError, Result};
use crate::resampler::resample_to_output_rate;
use crate::wav;
use crate::SAMPLE_RATE;
use mixtape_common::events::{EventBus, PipelineEvent};
use mixtape_common::set::{DJSet, DJSetTrack, TransitionPlan};
use std::path::Path;
use tracing::{debug, info, warn};

/// Edge fade length for tracks not covered by a transition
const EDGE_FADE_SECS: f64 = 0.5;

/// Minimum volume kept on a fading track while a transition effect is
/// active, so the effect stays audible
const EFFECT_FADE_FLOOR: f64 = 0.5;

/// Normalization target peak
const NORMALIZE_PEAK: f32 = 0.95;

/// A rendered set, normalized, ready for serialization
#[derive(Debug)]
pub struct RenderedSet {
    /// Interleaved stereo samples at 44.1 kHz
    pub samples: Vec<f32>,
    /// Peak absolute value before normalization
    pub peak: f32,
    /// Orders of tracks skipped due to decode failures
    pub skipped_tracks: Vec<u32>,
}

impl RenderedSet {
    pub fn duration_seconds(&self) -> f64 {
        (self.samples.len() / 2) as f64 / SAMPLE_RATE as f64
    }
}

/// Renders [`DJSet`]s to PCM.
pub struct SetRenderer {
    event_bus: Option<EventBus>,
}

impl SetRenderer {
    pub fn new() -> Self {
        Self { event_bus: None }
    }

    /// Report render progress through the given bus.
    pub fn with_event_bus(event_bus: EventBus) -> Self {
        Self {
            event_bus: Some(event_bus),
        }
    }

    /// Render a set and write it to a WAV file.
    pub fn render_to_wav(&self, set: &DJSet, path: &Path) -> Result<RenderedSet> {
        let rendered = self.render(set)?;
        wav::write_wav(path, &rendered.samples)?;
        info!(
            set_id = %set.id,
            path = %path.display(),
            duration = rendered.duration_seconds(),
            "Set rendered to WAV"
        );
        self.emit(PipelineEvent::SetRendered {
            set_id: set.id,
            output_path: path.display().to_string(),
            timestamp: chrono::Utc::now(),
        });
        Ok(rendered)
    }

    /// Render a set into a normalized stereo buffer.
    pub fn render(&self, set: &DJSet) -> Result<RenderedSet> {
        let result = self.render_inner(set);
        if result.is_err() {
            self.progress(set, -1.0);
        }
        result
    }

    fn render_inner(&self, set: &DJSet) -> Result<RenderedSet> {
        set.validate().map_err(RenderError::InvalidSet)?;

        let total_frames = (set.total_duration * SAMPLE_RATE as f64).ceil() as usize;
        let total_samples = total_frames * 2;
        info!(
            set_id = %set.id,
            tracks = set.tracks.len(),
            transitions = set.transitions.len(),
            duration = set.total_duration,
            "Rendering set"
        );

        let mut output: Vec<f32> = Vec::new();
        output
            .try_reserve_exact(total_samples)
            .map_err(|_| RenderError::Allocation {
                frames: total_frames,
            })?;
        output.resize(total_samples, 0.0);

        // Phase 1: load and prepare every track buffer
        let mut track_buffers: Vec<Option<Vec<f32>>> = Vec::with_capacity(set.tracks.len());
        let mut skipped_tracks = Vec::new();

        for (i, track) in set.tracks.iter().enumerate() {
            match self.load_track(track) {
                Ok(buffer) => track_buffers.push(Some(buffer)),
                Err(e) => {
                    warn!(
                        order = track.order,
                        filepath = %track.filepath,
                        error = %e,
                        "Skipping track, failed to load"
                    );
                    skipped_tracks.push(track.order);
                    track_buffers.push(None);
                }
            }
            self.progress(set, (i + 1) as f64 / (set.tracks.len() * 2) as f64);
        }

        if track_buffers.iter().all(Option::is_none) {
            return Err(RenderError::InvalidSet(
                "No track could be loaded".to_string(),
            ));
        }

        // Phase 2: fades, effects, and summation
        for (i, track) in set.tracks.iter().enumerate() {
            let Some(buffer) = track_buffers[i].as_mut() else {
                continue;
            };

            let transition_out = set
                .transitions
                .iter()
                .find(|t| t.from_order == track.order);
            let transition_in = set.transitions.iter().find(|t| t.to_order == track.order);

            if let Some(transition) = transition_out {
                apply_outgoing_fade(buffer, track, transition);
                apply_transition_effects(buffer, track, transition);
            }
            if let Some(transition) = transition_in {
                apply_incoming_fade(buffer, track, transition);
            }
            if transition_in.is_none() {
                apply_edge_fade_in(buffer);
            }
            if transition_out.is_none() {
                apply_edge_fade_out(buffer);
            }

            mix_into(&mut output, buffer, track.start_time);
            self.progress(
                set,
                0.5 + (i + 1) as f64 / (set.tracks.len() * 2) as f64,
            );
        }

        // Normalize to prevent clipping
        let peak = output.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        if peak > 0.0 {
            let scale = NORMALIZE_PEAK / peak;
            for sample in &mut output {
                *sample *= scale;
            }
        } else {
            warn!(set_id = %set.id, "Rendered output is silence");
        }

        self.progress(set, 1.0);

        Ok(RenderedSet {
            samples: output,
            peak,
            skipped_tracks,
        })
    }

    /// Decode, resample, slice, and pre-process one track.
    fn load_track(&self, track: &DJSetTrack) -> Result<Vec<f32>> {
        let decoded = AudioDecoder::decode_file(Path::new(&track.filepath))?;
        let audio = resample_to_output_rate(decoded.into_stereo())?;

        let frames = audio.frames();
        let slice_start = ((track.hot_cue_in_offset * SAMPLE_RATE as f64).round() as usize)
            .min(frames);
        let slice_end = ((track.hot_cue_out_offset * SAMPLE_RATE as f64).round() as usize)
            .clamp(slice_start, frames);
        if slice_end == slice_start {
            return Err(RenderError::Decode(format!(
                "Hot cue range [{}, {}) is outside the audio",
                track.hot_cue_in_offset, track.hot_cue_out_offset
            )));
        }

        let mut buffer = audio.samples[slice_start * 2..slice_end * 2].to_vec();

        // Pad or trim the extracted segment to the planned length
        let planned_frames = (track.planned_duration() * SAMPLE_RATE as f64).round() as usize;
        let actual_frames = buffer.len() / 2;
        if actual_frames > planned_frames {
            buffer.truncate(planned_frames * 2);
        } else if actual_frames < planned_frames {
            warn!(
                order = track.order,
                expected = planned_frames,
                actual = actual_frames,
                "Hot cue segment shorter than planned, padding with silence"
            );
            buffer.resize(planned_frames * 2, 0.0);
        }

        // Per-track gain
        if (track.gain_adjust - 1.0).abs() > f64::EPSILON {
            let gain = track.gain_adjust as f32;
            for sample in &mut buffer {
                *sample *= gain;
            }
        }

        // 3-band EQ
        let mut eq = ThreeBandEq::new(SAMPLE_RATE, track.eq_low, track.eq_mid, track.eq_high);
        if !eq.is_flat() {
            eq.process(&mut buffer);
        }

        debug!(
            order = track.order,
            frames = buffer.len() / 2,
            "Track prepared"
        );
        Ok(buffer)
    }

    fn progress(&self, set: &DJSet, fraction: f64) {
        self.emit(PipelineEvent::RenderProgress {
            set_id: set.id,
            fraction,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event);
        }
    }
}

impl Default for SetRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// True when any scheduled effect covers the given absolute set time.
fn effect_active_at(transition: &TransitionPlan, set_time: f64) -> bool {
    transition.effects.iter().any(|e| {
        let start = transition.start_time + e.start_at;
        set_time >= start && set_time < start + e.duration
    })
}

/// Apply the outgoing crossfade to the source track of a transition.
///
/// The fade factor is the curve at the reversed progress; frames where an
/// effect is active keep at least [`EFFECT_FADE_FLOOR`] volume.
fn apply_outgoing_fade(buffer: &mut [f32], track: &DJSetTrack, transition: &TransitionPlan) {
    let track_frames = buffer.len() / 2;
    let duration_frames = (transition.duration * SAMPLE_RATE as f64) as usize;
    if duration_frames == 0 {
        return;
    }
    let start_frame_global = (transition.start_time * SAMPLE_RATE as f64) as i64;
    let track_start_global = (track.start_time * SAMPLE_RATE as f64) as i64;

    for j in 0..duration_frames {
        let local = start_frame_global + j as i64 - track_start_global;
        if local < 0 || local as usize >= track_frames {
            continue;
        }
        let progress = j as f64 / duration_frames as f64;
        let mut factor = transition.crossfade_curve.fade_out(progress);

        let set_time = transition.start_time + j as f64 / SAMPLE_RATE as f64;
        if effect_active_at(transition, set_time) {
            factor = factor.max(EFFECT_FADE_FLOOR);
        }

        let idx = local as usize * 2;
        buffer[idx] *= factor as f32;
        buffer[idx + 1] *= factor as f32;
    }
}

/// Apply the incoming crossfade to the target track of a transition.
fn apply_incoming_fade(buffer: &mut [f32], track: &DJSetTrack, transition: &TransitionPlan) {
    let track_frames = buffer.len() / 2;
    let duration_frames = (transition.duration * SAMPLE_RATE as f64) as usize;
    if duration_frames == 0 {
        return;
    }
    let start_frame_global = (transition.start_time * SAMPLE_RATE as f64) as i64;
    let track_start_global = (track.start_time * SAMPLE_RATE as f64) as i64;

    for j in 0..duration_frames {
        let local = start_frame_global + j as i64 - track_start_global;
        if local < 0 || local as usize >= track_frames {
            continue;
        }
        let progress = j as f64 / duration_frames as f64;
        let mut factor = transition.crossfade_curve.fade_in(progress);

        let set_time = transition.start_time + j as f64 / SAMPLE_RATE as f64;
        if effect_active_at(transition, set_time) {
            factor = factor.max(EFFECT_FADE_FLOOR);
        }

        let idx = local as usize * 2;
        buffer[idx] *= factor as f32;
        buffer[idx + 1] *= factor as f32;
    }
}

/// Apply each scheduled effect to the samples it spans on the source track.
///
/// Effects run in list order; a kernel that produces non-finite output is
/// skipped and the render continues.
fn apply_transition_effects(buffer: &mut [f32], track: &DJSetTrack, transition: &TransitionPlan) {
    let track_frames = buffer.len() as i64 / 2;
    let track_start_global = (track.start_time * SAMPLE_RATE as f64) as i64;

    for effect in &transition.effects {
        let global_start =
            ((transition.start_time + effect.start_at) * SAMPLE_RATE as f64) as i64;
        let effect_frames = (effect.duration * SAMPLE_RATE as f64) as i64;

        let local_start = (global_start - track_start_global).clamp(0, track_frames);
        let local_end = (global_start - track_start_global + effect_frames).clamp(0, track_frames);
        if local_end <= local_start {
            continue;
        }

        let segment = &mut buffer[local_start as usize * 2..local_end as usize * 2];
        debug!(
            effect = effect.kind.as_str(),
            frames = segment.len() / 2,
            intensity = effect.intensity,
            "Applying transition effect"
        );
        effects::apply(effect, segment, SAMPLE_RATE);
    }
}

/// 0.5 s linear fade-in at the head of a buffer.
fn apply_edge_fade_in(buffer: &mut [f32]) {
    let fade_frames = ((EDGE_FADE_SECS * SAMPLE_RATE as f64) as usize).min(buffer.len() / 2);
    for frame in 0..fade_frames {
        let gain = frame as f32 / fade_frames as f32;
        buffer[frame * 2] *= gain;
        buffer[frame * 2 + 1] *= gain;
    }
}

/// 0.5 s linear fade-out at the tail of a buffer.
fn apply_edge_fade_out(buffer: &mut [f32]) {
    let total_frames = buffer.len() / 2;
    let fade_frames = ((EDGE_FADE_SECS * SAMPLE_RATE as f64) as usize).min(total_frames);
    for k in 0..fade_frames {
        let frame = total_frames - fade_frames + k;
        let gain = 1.0 - (k as f32 + 1.0) / fade_frames as f32;
        buffer[frame * 2] *= gain;
        buffer[frame * 2 + 1] *= gain;
    }
}

/// Sum a processed track buffer into the output at its start offset,
/// clipped to the output length.
fn mix_into(output: &mut [f32], buffer: &[f32], start_time: f64) {
    let start_sample = ((start_time * SAMPLE_RATE as f64) as usize) * 2;
    if start_sample >= output.len() {
        return;
    }
    let available = output.len() - start_sample;
    let count = buffer.len().min(available);
    for (out, sample) in output[start_sample..start_sample + count]
        .iter_mut()
        .zip(&buffer[..count])
    {
        *out += sample;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixtape_common::fade_curves::CrossfadeCurve;
    use mixtape_common::set::{
        DeckId, EffectKind, EnergyPattern, MixingStyle, RiskLevel, TransitionEffect,
        TransitionType,
    };
    use uuid::Uuid;

    fn stub_track(order: u32, start: f64, end: f64) -> DJSetTrack {
        DJSetTrack {
            order,
            filepath: format!("{order}.wav"),
            deck: if order % 2 == 1 { DeckId::A } else { DeckId::B },
            start_time: start,
            end_time: end,
            fade_in_time: start,
            fade_out_time: end,
            hot_cue_in_offset: 0.0,
            hot_cue_out_offset: end - start,
            gain_adjust: 1.0,
            eq_low: 0.0,
            eq_mid: 0.0,
            eq_high: 0.0,
            tempo_adjust: 0.0,
            title: None,
            artist: None,
            bpm: 120.0,
            key: None,
            energy_level: 0.5,
            mixing_note: String::new(),
        }
    }

    fn stub_transition(start: f64, duration: f64) -> TransitionPlan {
        TransitionPlan {
            from_order: 1,
            to_order: 2,
            start_time: start,
            duration,
            kind: TransitionType::SmoothBlend,
            crossfade_curve: CrossfadeCurve::Linear,
            effects: vec![],
            outro_cue: 0.9,
            intro_cue: 0.1,
            compatibility_score: 0.8,
            risk_level: RiskLevel::Safe,
            technique_notes: String::new(),
        }
    }

    #[test]
    fn test_outgoing_fade_reaches_zero() {
        let track = stub_track(1, 0.0, 10.0);
        let transition = stub_transition(5.0, 5.0);
        let mut buffer = vec![1.0f32; 10 * SAMPLE_RATE as usize * 2];
        apply_outgoing_fade(&mut buffer, &track, &transition);

        // Before the transition: untouched
        let at_4s = (4.0 * SAMPLE_RATE as f64) as usize * 2;
        assert_eq!(buffer[at_4s], 1.0);
        // Midway: half volume (linear curve)
        let at_7_5s = (7.5 * SAMPLE_RATE as f64) as usize * 2;
        assert!((buffer[at_7_5s] - 0.5).abs() < 0.01);
        // Near the end: almost silent
        let near_end = buffer.len() - 4;
        assert!(buffer[near_end] < 0.01);
    }

    #[test]
    fn test_fade_floor_during_effects() {
        let track = stub_track(1, 0.0, 10.0);
        let mut transition = stub_transition(5.0, 5.0);
        transition.effects = vec![TransitionEffect::new(EffectKind::FilterSweep, 0.0, 5.0, 0.4)];
        let mut buffer = vec![1.0f32; 10 * SAMPLE_RATE as usize * 2];
        apply_outgoing_fade(&mut buffer, &track, &transition);

        // With an active effect the outgoing track never drops below 0.5
        let near_end = buffer.len() - 4;
        assert!((buffer[near_end] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_incoming_fade_starts_silent() {
        let track = stub_track(2, 5.0, 15.0);
        let transition = stub_transition(5.0, 5.0);
        let mut buffer = vec![1.0f32; 10 * SAMPLE_RATE as usize * 2];
        apply_incoming_fade(&mut buffer, &track, &transition);

        assert!(buffer[0] < 0.001);
        let at_mid = (2.5 * SAMPLE_RATE as f64) as usize * 2;
        assert!((buffer[at_mid] - 0.5).abs() < 0.01);
        // After the transition window: untouched
        let at_7s = (7.0 * SAMPLE_RATE as f64) as usize * 2;
        assert_eq!(buffer[at_7s], 1.0);
    }

    #[test]
    fn test_edge_fades() {
        let mut buffer = vec![1.0f32; 2 * SAMPLE_RATE as usize * 2];
        apply_edge_fade_in(&mut buffer);
        apply_edge_fade_out(&mut buffer);

        assert_eq!(buffer[0], 0.0);
        let last = buffer.len() - 1;
        assert!(buffer[last] < 0.001);
        // Middle untouched
        let mid = buffer.len() / 2;
        assert_eq!(buffer[mid], 1.0);
    }

    #[test]
    fn test_mix_into_clips_at_output_end() {
        let mut output = vec![0.0f32; 100];
        let buffer = vec![1.0f32; 200];
        mix_into(&mut output, &buffer, 0.0);
        assert!(output.iter().all(|&s| s == 1.0));

        // Start beyond the output end is ignored
        let mut output = vec![0.0f32; 100];
        mix_into(&mut output, &buffer, 10.0);
        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_effect_active_at() {
        let mut transition = stub_transition(10.0, 8.0);
        transition.effects = vec![TransitionEffect::new(EffectKind::Echo, 2.0, 3.0, 0.3)];
        assert!(!effect_active_at(&transition, 11.9));
        assert!(effect_active_at(&transition, 12.0));
        assert!(effect_active_at(&transition, 14.9));
        assert!(!effect_active_at(&transition, 15.0));
    }

    #[test]
    fn test_render_invalid_set_rejected() {
        let set = DJSet {
            id: Uuid::new_v4(),
            name: "bad".to_string(),
            vibe: String::new(),
            total_duration: 10.0,
            energy_pattern: EnergyPattern::Wave,
            tracks: vec![stub_track(1, 0.0, 10.0), stub_track(2, 5.0, 15.0)],
            transitions: vec![], // missing transition
            energy_graph: vec![],
            key_moments: vec![],
            mixing_style: MixingStyle::Smooth,
        };
        let renderer = SetRenderer::new();
        assert!(matches!(
            renderer.render(&set),
            Err(RenderError::InvalidSet(_))
        ));
    }
}
