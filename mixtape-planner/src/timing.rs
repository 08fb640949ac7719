//! Timing materialization
//!
//! Converts an ordered track list plus validated transitions into absolute
//! set timing. Decks alternate A and B so a track never transitions into
//! itself on the same deck. Each track plays exactly its Mix In → Mix Out
//! segment; walking left to right, track i+1 starts where track i begins
//! fading out.

use crate::transitions::PlannedTransition;
use mixtape_common::set::{DJSetTrack, DeckId, TransitionPlan};
use mixtape_common::track::Track;
use tracing::debug;

/// Defaults when a track carries no Mix In / Mix Out cues
const DEFAULT_MIX_IN_FRACTION: f64 = 0.1;
const DEFAULT_MIX_OUT_FRACTION: f64 = 0.9;

/// Fade-out length noted on the final track (the renderer applies its own
/// edge fade; this is bookkeeping for display)
const FINAL_FADE_SECS: f64 = 10.0;

/// A fully timed set body
#[derive(Debug, Clone)]
pub struct TimedSet {
    pub tracks: Vec<DJSetTrack>,
    pub transitions: Vec<TransitionPlan>,
    pub total_duration: f64,
}

/// Extract the playable segment boundaries from a track's hot cues.
///
/// Prefers explicit "Mix In"/"Mix Out" cues, then intro/outro cues, then
/// falls back to 10% and 90% of the duration. An inverted range resets to
/// the defaults.
pub fn mix_cue_points(track: &Track) -> (f64, f64) {
    let mix_in = track
        .find_cue("mix in")
        .or_else(|| track.find_cue("intro"))
        .map(|cue| cue.time);
    let mix_out = track
        .find_cue("mix out")
        .or_else(|| track.find_cue("outro"))
        .map(|cue| cue.time);

    let mut mix_in = mix_in.unwrap_or(track.duration * DEFAULT_MIX_IN_FRACTION);
    let mut mix_out = mix_out.unwrap_or(track.duration * DEFAULT_MIX_OUT_FRACTION);

    if mix_out <= mix_in {
        debug!(
            filepath = %track.filepath,
            mix_in, mix_out,
            "Inverted mix cues, using duration fractions"
        );
        mix_in = track.duration * DEFAULT_MIX_IN_FRACTION;
        mix_out = track.duration * DEFAULT_MIX_OUT_FRACTION;
    }
    (mix_in, mix_out)
}

/// Materialize absolute timing for the ordered tracks and their planned
/// transitions (`planned.len() == tracks.len() - 1`).
pub fn materialize(
    tracks: &[Track],
    mixing_notes: &[String],
    planned: &[PlannedTransition],
    track_length_cap: Option<f64>,
) -> TimedSet {
    let mut set_tracks = Vec::with_capacity(tracks.len());
    let mut set_transitions = Vec::with_capacity(planned.len());
    let mut current_time = 0.0f64;

    for (i, track) in tracks.iter().enumerate() {
        let (mix_in, mut mix_out) = mix_cue_points(track);

        // The per-track cap trims the playable segment from the tail
        if let Some(cap) = track_length_cap {
            if mix_out - mix_in > cap {
                debug!(
                    filepath = %track.filepath,
                    segment = mix_out - mix_in,
                    cap,
                    "Applying track length cap"
                );
                mix_out = mix_in + cap;
            }
        }
        let segment_duration = mix_out - mix_in;

        let deck = if i % 2 == 0 { DeckId::A } else { DeckId::B };
        let start_time = current_time;
        let end_time = start_time + segment_duration;

        let (fade_out_time, advance_to) = if i < planned.len() {
            // Overlap cannot exceed the segment itself
            let overlap = planned[i].duration.min(segment_duration);
            let fade_out = end_time - overlap;
            (fade_out, fade_out)
        } else {
            let fade_out = end_time - FINAL_FADE_SECS.min(segment_duration);
            (fade_out, end_time)
        };

        set_tracks.push(DJSetTrack {
            order: (i + 1) as u32,
            filepath: track.filepath.clone(),
            deck,
            start_time,
            end_time,
            fade_in_time: start_time,
            fade_out_time,
            hot_cue_in_offset: mix_in,
            hot_cue_out_offset: mix_out,
            gain_adjust: 1.0,
            eq_low: 0.0,
            eq_mid: 0.0,
            eq_high: 0.0,
            tempo_adjust: 0.0,
            title: track.title.clone(),
            artist: track.artist.clone(),
            bpm: track.bpm,
            key: Some(
                track
                    .camelot_key
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| track.key.clone()),
            ),
            energy_level: track.energy_level,
            mixing_note: mixing_notes.get(i).cloned().unwrap_or_default(),
        });

        if i < planned.len() {
            let plan = &planned[i];
            set_transitions.push(TransitionPlan {
                from_order: (i + 1) as u32,
                to_order: (i + 2) as u32,
                start_time: fade_out_time,
                duration: plan.duration.min(segment_duration),
                kind: plan.kind,
                crossfade_curve: plan.crossfade_curve,
                effects: plan.effects.clone(),
                outro_cue: plan.outro_cue,
                intro_cue: plan.intro_cue,
                compatibility_score: plan.compatibility_score,
                risk_level: plan.risk_level,
                technique_notes: plan.technique_notes.clone(),
            });
        }

        current_time = advance_to;
    }

    let total_duration = set_tracks
        .iter()
        .map(|t| t.end_time)
        .fold(0.0f64, f64::max);

    TimedSet {
        tracks: set_tracks,
        transitions: set_transitions,
        total_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transitions::fallback_transition;
    use mixtape_common::track::{CueKind, EnergyProfile, HotCue, KeyScale};

    fn track_with_cues(name: &str, duration: f64, cues: Vec<(&str, f64)>) -> Track {
        Track {
            filepath: name.to_string(),
            file_hash: "h".to_string(),
            last_modified: 0,
            title: Some(name.to_string()),
            artist: None,
            album: None,
            genre: None,
            year: None,
            duration,
            bpm: 124.0,
            beat_times: vec![],
            key: "A".to_string(),
            scale: KeyScale::Minor,
            camelot_key: None,
            key_confidence: 0.5,
            energy_level: 0.5,
            energy_profile: EnergyProfile::Medium,
            structure: vec![],
            hot_cues: cues
                .into_iter()
                .enumerate()
                .map(|(i, (name, time))| HotCue {
                    name: name.to_string(),
                    time,
                    color: "#FFFFFF".to_string(),
                    kind: CueKind::Cue,
                    index: i,
                })
                .collect(),
            analysis_version: 1,
        }
    }

    #[test]
    fn test_mix_cues_from_hot_cues() {
        let track = track_with_cues("a", 300.0, vec![("Mix In", 15.0), ("Mix Out", 280.0)]);
        assert_eq!(mix_cue_points(&track), (15.0, 280.0));
    }

    #[test]
    fn test_mix_cues_default_fractions() {
        let track = track_with_cues("a", 200.0, vec![]);
        let (mix_in, mix_out) = mix_cue_points(&track);
        assert!((mix_in - 20.0).abs() < 1e-9);
        assert!((mix_out - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_cues_reset() {
        let track = track_with_cues("a", 200.0, vec![("Mix In", 150.0), ("Mix Out", 50.0)]);
        let (mix_in, mix_out) = mix_cue_points(&track);
        assert!(mix_out > mix_in);
        assert!((mix_in - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_timing_walk() {
        let tracks = vec![
            track_with_cues("a", 300.0, vec![("Mix In", 10.0), ("Mix Out", 190.0)]),
            track_with_cues("b", 300.0, vec![("Mix In", 20.0), ("Mix Out", 200.0)]),
        ];
        let planned = vec![fallback_transition()];
        let timed = materialize(&tracks, &[], &planned, None);

        assert_eq!(timed.tracks.len(), 2);
        assert_eq!(timed.transitions.len(), 1);

        let first = &timed.tracks[0];
        let second = &timed.tracks[1];
        let transition = &timed.transitions[0];

        // Track 1: segment 180s starting at 0
        assert_eq!(first.start_time, 0.0);
        assert_eq!(first.end_time, 180.0);
        // Transition starts where track 1 begins fading out
        assert_eq!(transition.start_time, first.fade_out_time);
        assert_eq!(first.fade_out_time, 180.0 - transition.duration);
        // Track 2 starts at the transition start
        assert_eq!(second.start_time, transition.start_time);
        assert_eq!(second.end_time, second.start_time + 180.0);
        // Decks alternate
        assert_eq!(first.deck, DeckId::A);
        assert_eq!(second.deck, DeckId::B);

        assert_eq!(timed.total_duration, second.end_time);
    }

    #[test]
    fn test_track_length_cap_trims_segment() {
        let tracks = vec![track_with_cues(
            "a",
            400.0,
            vec![("Mix In", 10.0), ("Mix Out", 390.0)],
        )];
        let timed = materialize(&tracks, &[], &[], Some(120.0));
        let track = &timed.tracks[0];
        assert_eq!(track.hot_cue_in_offset, 10.0);
        assert_eq!(track.hot_cue_out_offset, 130.0);
        assert_eq!(track.end_time, 120.0);
    }

    #[test]
    fn test_overlap_clamped_to_segment() {
        // 30-second segments with a 60-second requested crossfade
        let tracks = vec![
            track_with_cues("a", 40.0, vec![("Mix In", 5.0), ("Mix Out", 35.0)]),
            track_with_cues("b", 40.0, vec![("Mix In", 5.0), ("Mix Out", 35.0)]),
        ];
        let mut plan = fallback_transition();
        plan.duration = 60.0;
        let timed = materialize(&tracks, &[], &[plan], None);

        let transition = &timed.transitions[0];
        assert!(transition.duration <= 30.0);
        assert!(timed.tracks[0].fade_out_time >= timed.tracks[0].start_time);
    }

    #[test]
    fn test_mixing_notes_attached() {
        let tracks = vec![track_with_cues("a", 200.0, vec![])];
        let notes = vec!["open with the pads".to_string()];
        let timed = materialize(&tracks, &notes, &[], None);
        assert_eq!(timed.tracks[0].mixing_note, "open with the pads");
    }
}
