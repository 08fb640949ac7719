//! Candidate selection
//!
//! Queries the library store for tracks matching the vibe's BPM range
//! (expanded ±10%) and genre preferences. When too few candidates surface,
//! constraints relax in order: drop the genre filter, widen the BPM range,
//! then drop the BPM constraint entirely.

use crate::error::Result;
use crate::oracle::VibeAnalysis;
use mixtape_analysis::{Criteria, LibraryStore};
use mixtape_common::track::Track;
use tracing::{debug, info};

/// Initial expansion applied to the vibe's BPM range
const BPM_EXPANSION: f64 = 0.10;
/// Expansion used by the widen-bpm relaxation rung
const BPM_WIDE_EXPANSION: f64 = 0.25;

/// Select candidate tracks for the vibe, relaxing constraints until the
/// target count is reached or nothing is left to relax.
pub async fn select_candidates(
    store: &LibraryStore,
    vibe: &VibeAnalysis,
    target: usize,
) -> Result<Vec<Track>> {
    let min_bpm = vibe.bpm_range.min * (1.0 - BPM_EXPANSION);
    let max_bpm = vibe.bpm_range.max * (1.0 + BPM_EXPANSION);

    // Rung 1: BPM range plus genre preference
    let mut candidates = query_bpm(store, min_bpm, max_bpm).await?;
    if !vibe.genre_preferences.is_empty() {
        let genre_matched: Vec<Track> = candidates
            .iter()
            .filter(|t| genre_matches(t, &vibe.genre_preferences))
            .cloned()
            .collect();
        if genre_matched.len() >= target {
            info!(count = genre_matched.len(), "Candidates selected (bpm + genre)");
            return Ok(genre_matched);
        }
        debug!(
            matched = genre_matched.len(),
            target, "Genre filter too restrictive, dropping it"
        );
    }

    // Rung 2: BPM range only
    if candidates.len() >= target {
        info!(count = candidates.len(), "Candidates selected (bpm)");
        return Ok(candidates);
    }

    // Rung 3: widened BPM range
    let wide_min = vibe.bpm_range.min * (1.0 - BPM_WIDE_EXPANSION);
    let wide_max = vibe.bpm_range.max * (1.0 + BPM_WIDE_EXPANSION);
    candidates = query_bpm(store, wide_min, wide_max).await?;
    if candidates.len() >= target {
        info!(count = candidates.len(), "Candidates selected (widened bpm)");
        return Ok(candidates);
    }
    debug!(
        matched = candidates.len(),
        target, "Widened BPM still too restrictive, dropping BPM"
    );

    // Rung 4: everything analyzed
    let all = store.find_by(&Criteria::new()).await?;
    info!(count = all.len(), "Candidates selected (unconstrained)");
    Ok(all)
}

async fn query_bpm(store: &LibraryStore, min: f64, max: f64) -> Result<Vec<Track>> {
    let criteria = Criteria::new().gte("bpm", min).lte("bpm", max);
    Ok(store.find_by(&criteria).await?)
}

/// Case-insensitive substring match against any preferred genre.
fn genre_matches(track: &Track, preferences: &[String]) -> bool {
    let Some(genre) = &track.genre else {
        return false;
    };
    let genre = genre.to_lowercase();
    preferences
        .iter()
        .any(|p| genre.contains(&p.to_lowercase()) || p.to_lowercase().contains(&genre))
}
