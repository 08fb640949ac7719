//! Energy-pattern ordering
//!
//! Arranges chosen tracks so the energy sequence matches the requested
//! pattern. Ties between orderings break toward the smaller total BPM jump
//! between neighbors, so harmonically lazy transitions stay available.

use mixtape_common::set::EnergyPattern;
use mixtape_common::track::Track;

/// A peak-time set stays above this energy; tracks below it only appear
/// in the wind-down tail
const PEAK_TIME_FLOOR: f64 = 0.8;

/// Order tracks to fit the requested energy pattern.
pub fn order_by_pattern(mut tracks: Vec<Track>, pattern: EnergyPattern) -> Vec<Track> {
    match pattern {
        EnergyPattern::Building => {
            sort_with_bpm_tiebreak(&mut tracks, false);
            tracks
        }
        EnergyPattern::Cooling => {
            sort_with_bpm_tiebreak(&mut tracks, true);
            tracks
        }
        EnergyPattern::PeakTime => peak_time_plateau(tracks),
        EnergyPattern::Wave => interleave_wave(tracks),
    }
}

/// Sustained plateau: every track above [`PEAK_TIME_FLOOR`] plays first,
/// ordered by BPM rather than by energy so the plateau holds level with
/// small tempo jumps instead of sliding downward. Whatever sits below the
/// floor winds the set down at the tail, by energy descending.
fn peak_time_plateau(tracks: Vec<Track>) -> Vec<Track> {
    let (mut plateau, mut tail): (Vec<Track>, Vec<Track>) = tracks
        .into_iter()
        .partition(|t| t.energy_level > PEAK_TIME_FLOOR);

    plateau.sort_by(|a, b| {
        a.bpm
            .partial_cmp(&b.bpm)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sort_with_bpm_tiebreak(&mut tail, true);

    plateau.extend(tail);
    plateau
}

/// Sort by energy, breaking equal-energy runs by BPM so adjacent jumps
/// stay small.
fn sort_with_bpm_tiebreak(tracks: &mut [Track], descending: bool) {
    tracks.sort_by(|a, b| {
        let energy = a
            .energy_level
            .partial_cmp(&b.energy_level)
            .unwrap_or(std::cmp::Ordering::Equal);
        let energy = if descending { energy.reverse() } else { energy };
        energy.then(
            a.bpm
                .partial_cmp(&b.bpm)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
}

/// Alternate high and low energy: the set splits at the median and the two
/// halves interleave, keeping at least the halves' gap between neighbors
/// where the pool allows it.
fn interleave_wave(mut tracks: Vec<Track>) -> Vec<Track> {
    if tracks.len() < 3 {
        return tracks;
    }

    sort_with_bpm_tiebreak(&mut tracks, false);
    let split = tracks.len() / 2;
    let high: Vec<Track> = tracks.split_off(split);
    let low = tracks;

    let mut result = Vec::with_capacity(high.len() + low.len());
    let mut high_iter = high.into_iter().rev(); // strongest first
    let mut low_iter = low.into_iter();
    loop {
        match (high_iter.next(), low_iter.next()) {
            (None, None) => break,
            (h, l) => {
                if let Some(h) = h {
                    result.push(h);
                }
                if let Some(l) = l {
                    result.push(l);
                }
            }
        }
    }
    result
}

/// Total BPM jump across adjacent pairs; used by tests and diagnostics.
pub fn total_bpm_jump(tracks: &[Track]) -> f64 {
    tracks
        .windows(2)
        .map(|pair| (pair[0].bpm - pair[1].bpm).abs())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixtape_common::track::{EnergyProfile, KeyScale};

    fn track(name: &str, energy: f64, bpm: f64) -> Track {
        Track {
            filepath: name.to_string(),
            file_hash: "h".to_string(),
            last_modified: 0,
            title: Some(name.to_string()),
            artist: None,
            album: None,
            genre: None,
            year: None,
            duration: 240.0,
            bpm,
            beat_times: vec![],
            key: "C".to_string(),
            scale: KeyScale::Major,
            camelot_key: None,
            key_confidence: 0.5,
            energy_level: energy,
            energy_profile: EnergyProfile::Medium,
            structure: vec![],
            hot_cues: vec![],
            analysis_version: 1,
        }
    }

    #[test]
    fn test_building_monotonically_increases() {
        let tracks = vec![
            track("a", 0.8, 128.0),
            track("b", 0.3, 120.0),
            track("c", 0.6, 124.0),
        ];
        let ordered = order_by_pattern(tracks, EnergyPattern::Building);
        let energies: Vec<f64> = ordered.iter().map(|t| t.energy_level).collect();
        assert_eq!(energies, vec![0.3, 0.6, 0.8]);
    }

    #[test]
    fn test_cooling_monotonically_decreases() {
        let tracks = vec![
            track("a", 0.3, 128.0),
            track("b", 0.8, 120.0),
            track("c", 0.6, 124.0),
        ];
        let ordered = order_by_pattern(tracks, EnergyPattern::Cooling);
        let energies: Vec<f64> = ordered.iter().map(|t| t.energy_level).collect();
        assert_eq!(energies, vec![0.8, 0.6, 0.3]);
    }

    #[test]
    fn test_equal_energy_breaks_by_bpm() {
        let tracks = vec![
            track("a", 0.5, 140.0),
            track("b", 0.5, 120.0),
            track("c", 0.5, 130.0),
        ];
        let ordered = order_by_pattern(tracks, EnergyPattern::Building);
        let bpms: Vec<f64> = ordered.iter().map(|t| t.bpm).collect();
        assert_eq!(bpms, vec![120.0, 130.0, 140.0]);
        assert_eq!(total_bpm_jump(&ordered), 20.0);
    }

    #[test]
    fn test_wave_alternates() {
        let tracks = vec![
            track("a", 0.2, 120.0),
            track("b", 0.9, 124.0),
            track("c", 0.3, 122.0),
            track("d", 0.8, 126.0),
            track("e", 0.4, 121.0),
            track("f", 0.7, 125.0),
        ];
        let ordered = order_by_pattern(tracks, EnergyPattern::Wave);
        let energies: Vec<f64> = ordered.iter().map(|t| t.energy_level).collect();

        // Direction flips between every adjacent pair
        for window in energies.windows(3) {
            let first_up = window[1] > window[0];
            let second_up = window[2] > window[1];
            assert_ne!(first_up, second_up, "no alternation in {energies:?}");
        }
        // Adjacent swings carry real amplitude
        for pair in energies.windows(2) {
            assert!((pair[0] - pair[1]).abs() >= 0.2, "flat swing in {energies:?}");
        }
    }

    #[test]
    fn test_peak_time_plateau_before_wind_down() {
        // Mixed pool: three peak-worthy tracks and two quiet ones
        let tracks = vec![
            track("a", 0.85, 130.0),
            track("b", 0.5, 120.0),
            track("c", 0.95, 126.0),
            track("d", 0.3, 128.0),
            track("e", 0.9, 122.0),
        ];
        let ordered = order_by_pattern(tracks, EnergyPattern::PeakTime);
        let energies: Vec<f64> = ordered.iter().map(|t| t.energy_level).collect();

        // Everything above the floor plays before anything below it
        assert!(energies[..3].iter().all(|&e| e > 0.8), "plateau: {energies:?}");
        assert!(energies[3..].iter().all(|&e| e <= 0.8), "tail: {energies:?}");

        // The plateau holds level by BPM, not by descending energy: a
        // cooling-style sort would open with 0.95, the plateau opens with
        // the slowest peak track instead
        assert_eq!(energies[..3], [0.9, 0.95, 0.85]);
        let plateau_bpms: Vec<f64> = ordered[..3].iter().map(|t| t.bpm).collect();
        assert!(plateau_bpms.windows(2).all(|p| p[0] <= p[1]));

        // The tail winds down
        assert_eq!(energies[3..], [0.5, 0.3]);
    }

    #[test]
    fn test_peak_time_differs_from_cooling() {
        let tracks = vec![
            track("a", 0.85, 130.0),
            track("b", 0.95, 126.0),
            track("c", 0.9, 122.0),
            track("d", 0.4, 124.0),
        ];
        let peak = order_by_pattern(tracks.clone(), EnergyPattern::PeakTime);
        let cooling = order_by_pattern(tracks, EnergyPattern::Cooling);

        let peak_order: Vec<&str> = peak.iter().map(|t| t.filepath.as_str()).collect();
        let cooling_order: Vec<&str> = cooling.iter().map(|t| t.filepath.as_str()).collect();
        assert_eq!(cooling_order, vec!["b", "c", "a", "d"]);
        assert_eq!(peak_order, vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn test_tiny_input_passthrough() {
        let tracks = vec![track("a", 0.5, 120.0), track("b", 0.6, 121.0)];
        let ordered = order_by_pattern(tracks, EnergyPattern::Wave);
        assert_eq!(ordered.len(), 2);
    }
}
