//! End-to-end render pipeline tests against synthesized WAV fixtures

use mixtape_common::fade_curves::CrossfadeCurve;
use mixtape_common::set::{
    DJSet, DJSetTrack, DeckId, EffectKind, EnergyPattern, MixingStyle, RiskLevel,
    TransitionEffect, TransitionPlan, TransitionType,
};
use mixtape_render::{RenderedSet, SetRenderer, SAMPLE_RATE};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Write a stereo sine-wave WAV fixture and return its path.
fn write_sine_fixture(dir: &Path, name: &str, freq: f64, seconds: f64) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let frames = (seconds * SAMPLE_RATE as f64) as usize;
    for n in 0..frames {
        let v = (2.0 * std::f64::consts::PI * freq * n as f64 / SAMPLE_RATE as f64).sin() * 0.5;
        let sample = (v * 32767.0) as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn set_track(order: u32, filepath: &Path, start: f64, end: f64, mix_in: f64, mix_out: f64) -> DJSetTrack {
    DJSetTrack {
        order,
        filepath: filepath.display().to_string(),
        deck: if order % 2 == 1 { DeckId::A } else { DeckId::B },
        start_time: start,
        end_time: end,
        fade_in_time: start,
        fade_out_time: end,
        hot_cue_in_offset: mix_in,
        hot_cue_out_offset: mix_out,
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

fn single_track_set(filepath: &Path, seconds: f64) -> DJSet {
    DJSet {
        id: Uuid::new_v4(),
        name: "single".to_string(),
        vibe: "test".to_string(),
        total_duration: seconds,
        energy_pattern: EnergyPattern::Wave,
        tracks: vec![set_track(1, filepath, 0.0, seconds, 0.0, seconds)],
        transitions: vec![],
        energy_graph: vec![0.5],
        key_moments: vec![],
        mixing_style: MixingStyle::Smooth,
    }
}

fn crossfade_set(a: &Path, b: &Path, effects: Vec<TransitionEffect>) -> DJSet {
    // A plays 0-8s, B plays 4-12s, crossfade over 4-8s
    DJSet {
        id: Uuid::new_v4(),
        name: "crossfade".to_string(),
        vibe: "test".to_string(),
        total_duration: 12.0,
        energy_pattern: EnergyPattern::Wave,
        tracks: vec![
            set_track(1, a, 0.0, 8.0, 0.0, 8.0),
            set_track(2, b, 4.0, 12.0, 0.0, 8.0),
        ],
        transitions: vec![TransitionPlan {
            from_order: 1,
            to_order: 2,
            start_time: 4.0,
            duration: 4.0,
            kind: TransitionType::SmoothBlend,
            crossfade_curve: CrossfadeCurve::SCurve,
            effects,
            outro_cue: 0.9,
            intro_cue: 0.1,
            compatibility_score: 0.8,
            risk_level: RiskLevel::Safe,
            technique_notes: String::new(),
        }],
        energy_graph: vec![0.5, 0.5],
        key_moments: vec![],
        mixing_style: MixingStyle::Smooth,
    }
}

/// RMS over a time window of the rendered output.
fn window_rms(rendered: &RenderedSet, from_secs: f64, to_secs: f64) -> f64 {
    let start = (from_secs * SAMPLE_RATE as f64) as usize * 2;
    let end = ((to_secs * SAMPLE_RATE as f64) as usize * 2).min(rendered.samples.len());
    let window = &rendered.samples[start..end];
    (window.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / window.len() as f64).sqrt()
}

/// RMS of the first difference of the left channel: a crude high-pass that
/// isolates high-frequency energy from low-frequency content.
fn window_hf_rms(rendered: &RenderedSet, from_secs: f64, to_secs: f64) -> f64 {
    let start = (from_secs * SAMPLE_RATE as f64) as usize;
    let end = ((to_secs * SAMPLE_RATE as f64) as usize).min(rendered.samples.len() / 2);
    let left: Vec<f64> = (start..end).map(|f| rendered.samples[f * 2] as f64).collect();
    let diffs: Vec<f64> = left.windows(2).map(|p| p[1] - p[0]).collect();
    (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt()
}

#[test]
fn test_single_track_render() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_sine_fixture(dir.path(), "a.wav", 440.0, 6.0);
    let set = single_track_set(&fixture, 6.0);

    let rendered = SetRenderer::new().render(&set).unwrap();

    assert!((rendered.duration_seconds() - 6.0).abs() < 0.05);
    // Normalized output never clips
    let peak = rendered.samples.iter().fold(0.0f32, |a, &s| a.max(s.abs()));
    assert!(peak <= 0.95 + 1e-4, "peak {peak}");

    // Edge fades: the first and last 0.1s are much quieter than the middle
    let head = window_rms(&rendered, 0.0, 0.1);
    let middle = window_rms(&rendered, 2.0, 4.0);
    let tail = window_rms(&rendered, 5.9, 6.0);
    assert!(head < middle * 0.3, "head {head} vs middle {middle}");
    assert!(tail < middle * 0.3, "tail {tail} vs middle {middle}");
}

#[test]
fn test_two_track_crossfade() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_sine_fixture(dir.path(), "a.wav", 440.0, 10.0);
    let b = write_sine_fixture(dir.path(), "b.wav", 660.0, 10.0);
    let set = crossfade_set(&a, &b, vec![]);

    let rendered = SetRenderer::new().render(&set).unwrap();
    assert!((rendered.duration_seconds() - 12.0).abs() < 0.05);
    assert!(rendered.skipped_tracks.is_empty());

    // Audio is present before, during, and after the transition
    let before = window_rms(&rendered, 1.0, 3.0);
    let during = window_rms(&rendered, 5.5, 6.5);
    let after = window_rms(&rendered, 9.0, 11.0);
    assert!(before > 0.1);
    assert!(during > 0.1);
    assert!(after > 0.1);

    // Crossfaded region stays in the same loudness ballpark as either side
    assert!(during < before * 2.0 && during > before * 0.3);
}

#[test]
fn test_filter_sweep_attenuates_outgoing_highs() {
    let dir = tempfile::tempdir().unwrap();
    // Outgoing track carries high-frequency content the sweep should remove
    let a = write_sine_fixture(dir.path(), "a.wav", 8000.0, 10.0);
    let b = write_sine_fixture(dir.path(), "b.wav", 200.0, 10.0);

    let plain = SetRenderer::new()
        .render(&crossfade_set(&a, &b, vec![]))
        .unwrap();
    let swept = SetRenderer::new()
        .render(&crossfade_set(
            &a,
            &b,
            vec![TransitionEffect::new(EffectKind::FilterSweep, 0.0, 4.0, 0.7)],
        ))
        .unwrap();

    // Early in the transition the sweep cutoff sits at 200 Hz, so the 8 kHz
    // outgoing tone is strongly attenuated relative to the plain crossfade.
    // Comparing high-frequency energy keeps the incoming 200 Hz track from
    // polluting the measurement.
    let plain_head = window_hf_rms(&plain, 4.05, 4.5);
    let swept_head = window_hf_rms(&swept, 4.05, 4.5);
    assert!(
        swept_head < plain_head * 0.3,
        "swept {swept_head} vs plain {plain_head}"
    );
}

#[test]
fn test_short_hot_cue_range_is_padded() {
    let dir = tempfile::tempdir().unwrap();
    // Only 3 seconds of source audio for a 6-second slot
    let fixture = write_sine_fixture(dir.path(), "short.wav", 440.0, 3.0);
    let mut set = single_track_set(&fixture, 6.0);
    set.tracks[0].hot_cue_out_offset = 6.0;

    let rendered = SetRenderer::new().render(&set).unwrap();
    // The set still renders at full planned length
    assert!((rendered.duration_seconds() - 6.0).abs() < 0.05);
    // The padded half is silence
    let padded = window_rms(&rendered, 4.0, 5.5);
    assert!(padded < 1e-6, "padding not silent: {padded}");
}

#[test]
fn test_decode_failure_skips_track() {
    let dir = tempfile::tempdir().unwrap();
    let b = write_sine_fixture(dir.path(), "b.wav", 660.0, 10.0);
    let missing = dir.path().join("missing.wav");
    let set = crossfade_set(&missing, &b, vec![]);

    let rendered = SetRenderer::new().render(&set).unwrap();
    assert_eq!(rendered.skipped_tracks, vec![1]);
    // Track B still plays
    assert!(window_rms(&rendered, 9.0, 11.0) > 0.1);
}

#[test]
fn test_deterministic_render() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_sine_fixture(dir.path(), "a.wav", 440.0, 10.0);
    let b = write_sine_fixture(dir.path(), "b.wav", 660.0, 10.0);
    let set = crossfade_set(
        &a,
        &b,
        vec![TransitionEffect::new(EffectKind::Echo, 1.0, 2.0, 0.4)],
    );

    let first = SetRenderer::new().render(&set).unwrap();
    let second = SetRenderer::new().render(&set).unwrap();
    assert_eq!(first.samples, second.samples);
}

#[test]
fn test_wav_output_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_sine_fixture(dir.path(), "a.wav", 440.0, 6.0);
    let set = single_track_set(&fixture, 6.0);
    let out_path = dir.path().join("rendered.wav");

    let rendered = SetRenderer::new().render_to_wav(&set, &out_path).unwrap();

    let mut reader = hound::WavReader::open(&out_path).unwrap();
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 2);
    let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(decoded.len(), rendered.samples.len());
}
