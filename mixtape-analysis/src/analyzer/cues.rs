//! Hot cue synthesis
//!
//! Cues come from structural boundaries snapped to the beat grid, colored
//! by segment type. "Mix In" and "Mix Out" markers are injected on the
//! beat grid when no intro/outro cue came out of segmentation.

use mixtape_common::track::{cue_color, CueKind, HotCue, StructureSegment, MAX_HOT_CUES};

/// Boundaries of segments shorter than this get no cue
const MIN_SEGMENT_SECS: f64 = 4.0;

/// Mix In lands on this beat when injected
const MIX_IN_BEAT: usize = 16;
/// Mix Out lands this many beats before the end when injected
const MIX_OUT_BEATS_FROM_END: usize = 32;

/// Generate the hot cue list for an analyzed track.
pub fn generate_hot_cues(
    structure: &[StructureSegment],
    beat_times: &[f64],
    duration: f64,
) -> Vec<HotCue> {
    let mut cues: Vec<HotCue> = Vec::new();

    for (i, segment) in structure.iter().enumerate() {
        if segment.end - segment.start < MIN_SEGMENT_SECS {
            continue;
        }

        let time = snap_to_beat(segment.start, beat_times).clamp(0.0, duration);
        let label = segment.kind.as_str();
        cues.push(HotCue {
            name: format!("{} {}", capitalize(label), i + 1),
            time,
            color: cue_color(label).to_string(),
            kind: CueKind::Cue,
            index: cues.len(),
        });
    }

    // Inject mix points when segmentation produced no usable intro/outro cue
    let has_intro = cues.iter().any(|c| c.name.to_lowercase().starts_with("intro"));
    if !has_intro && beat_times.len() >= 2 * MIX_IN_BEAT {
        cues.insert(
            0,
            HotCue {
                name: "Mix In".to_string(),
                time: beat_times[MIX_IN_BEAT],
                color: cue_color("intro").to_string(),
                kind: CueKind::Cue,
                index: 0,
            },
        );
    }

    let has_outro = cues.iter().any(|c| c.name.to_lowercase().starts_with("outro"));
    if !has_outro && beat_times.len() >= 2 * MIX_OUT_BEATS_FROM_END {
        cues.push(HotCue {
            name: "Mix Out".to_string(),
            time: beat_times[beat_times.len() - MIX_OUT_BEATS_FROM_END],
            color: cue_color("outro").to_string(),
            kind: CueKind::Cue,
            index: cues.len(),
        });
    }

    cues.truncate(MAX_HOT_CUES);
    for (i, cue) in cues.iter_mut().enumerate() {
        cue.index = i;
    }
    cues
}

/// Nearest beat time to a boundary; the boundary itself when no beats exist.
fn snap_to_beat(time: f64, beat_times: &[f64]) -> f64 {
    beat_times
        .iter()
        .copied()
        .min_by(|a, b| {
            (a - time)
                .abs()
                .partial_cmp(&(b - time).abs())
                .unwrap()
        })
        .unwrap_or(time)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
