//! Time-domain rhythmic effects: gate and scratch

/// Assumed tempo when a transition carries no tempo context
const GATE_ASSUMED_BPM: f64 = 120.0;

/// Scratch window length in seconds
const SCRATCH_WINDOW_SECS: f64 = 0.25;

/// Rhythmic volume cut at a 16th-note rate.
///
/// Alternate 16th-note segments are attenuated by `1 - intensity`.
pub fn gate(buffer: &mut [f32], sample_rate: u32, intensity: f64) {
    // One 16th note at the assumed tempo
    let segment_secs = 60.0 / GATE_ASSUMED_BPM / 4.0;
    let segment_frames = (segment_secs * sample_rate as f64) as usize;
    if segment_frames == 0 {
        return;
    }

    let gain = (1.0 - intensity).clamp(0.0, 1.0) as f32;
    for (segment_idx, chunk) in buffer.chunks_mut(segment_frames * 2).enumerate() {
        if segment_idx % 2 == 1 {
            for sample in chunk {
                *sample *= gain;
            }
        }
    }
}

/// Vinyl-scratch simulation.
///
/// Each ~0.25 s window is resampled by a sinusoidally varying rate
/// (amplitude `intensity·0.5`, phase a pure function of the window index),
/// stretched back to the original length by linear interpolation, and
/// crossfaded into the dry signal by `intensity·0.7`.
pub fn scratch(buffer: &mut [f32], sample_rate: u32, intensity: f64) {
    let frames = buffer.len() / 2;
    let window = (SCRATCH_WINDOW_SECS * sample_rate as f64) as usize;
    if window < 2 || frames < window {
        return;
    }

    let mix = (intensity * 0.7).clamp(0.0, 1.0) as f32;
    let dry_gain = 1.0 - mix;

    let mut scratch_l = Vec::new();
    let mut scratch_r = Vec::new();

    for (window_idx, start) in (0..frames).step_by(window).enumerate() {
        let end = (start + window).min(frames);
        let len = end - start;
        if len < 2 {
            break;
        }

        // Four windows per scratch cycle
        let phase = 2.0 * std::f64::consts::PI * window_idx as f64 / 4.0;
        let rate = 1.0 + phase.sin() * intensity * 0.5;
        let resampled_len = (len as f64 / rate) as usize;
        if resampled_len < 2 || resampled_len > len * 2 {
            continue;
        }

        for (ch, scratch_buf) in [&mut scratch_l, &mut scratch_r].into_iter().enumerate() {
            scratch_buf.clear();
            scratch_buf.extend((start..end).map(|f| buffer[2 * f + ch]));

            let resampled = lerp_resample(scratch_buf, resampled_len);
            let stretched = lerp_resample(&resampled, len);

            for (k, frame) in (start..end).enumerate() {
                let idx = 2 * frame + ch;
                buffer[idx] = buffer[idx] * dry_gain + stretched[k] * mix;
            }
        }
    }
}

/// Linear-interpolation resample of one channel to a new length.
fn lerp_resample(src: &[f32], new_len: usize) -> Vec<f32> {
    if src.len() < 2 || new_len < 2 {
        return src.to_vec();
    }
    let scale = (src.len() - 1) as f64 / (new_len - 1) as f64;
    (0..new_len)
        .map(|k| {
            let pos = k as f64 * scale;
            let lower = pos.floor() as usize;
            let upper = (lower + 1).min(src.len() - 1);
            let frac = (pos - lower as f64) as f32;
            src[lower] * (1.0 - frac) + src[upper] * frac
        })
        .collect()
}
