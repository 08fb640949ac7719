//! Delay-line effects: echo, delay, reverb, flanger

/// Single-tap delay with feedback and dry/wet mix.
///
/// Echo and delay are the same kernel with different tap lengths and
/// feedback amounts (echo: 250 ms, delay: 500 ms by default).
pub fn tap_delay(buffer: &mut [f32], sample_rate: u32, delay_ms: f64, feedback: f64, mix: f64) {
    let frames = buffer.len() / 2;
    let delay_frames = (delay_ms * sample_rate as f64 / 1000.0) as usize;
    if delay_frames == 0 || delay_frames >= frames {
        return;
    }

    let feedback = feedback as f32;
    let mix = mix.clamp(0.0, 1.0) as f32;
    let dry = buffer.to_vec();

    for frame in 0..frames {
        for ch in 0..2 {
            let idx = 2 * frame + ch;
            let delayed = if frame >= delay_frames {
                dry[2 * (frame - delay_frames) + ch] * feedback
            } else {
                0.0
            };
            buffer[idx] = dry[idx] * (1.0 - mix) + delayed * mix;
        }
    }
}

/// Reverb tap offsets in seconds and their gains
const REVERB_TAPS: [(f64, f64); 4] = [(0.013, 0.8), (0.027, 0.6), (0.037, 0.4), (0.043, 0.3)];

/// Small-room reverb from four fixed delay taps.
///
/// Tap spacing scales with `room_size = 0.3 + 0.5·intensity`; wet mix is
/// `0.3 + 0.5·intensity`.
pub fn reverb(buffer: &mut [f32], sample_rate: u32, intensity: f64) {
    let frames = buffer.len() / 2;
    if frames == 0 {
        return;
    }

    let room_size = 0.3 + 0.5 * intensity;
    let wet = (0.3 + 0.5 * intensity).clamp(0.0, 1.0) as f32;
    let dry_gain = 1.0 - wet;

    let taps: Vec<(usize, f32)> = REVERB_TAPS
        .iter()
        .map(|&(secs, gain)| ((secs * sample_rate as f64 * room_size) as usize, gain as f32))
        .filter(|&(delay, _)| delay > 0 && delay < frames)
        .collect();
    if taps.is_empty() {
        return;
    }

    let dry = buffer.to_vec();
    for frame in 0..frames {
        for ch in 0..2 {
            let idx = 2 * frame + ch;
            let mut wet_sum = 0.0f32;
            for &(delay, gain) in &taps {
                if frame >= delay {
                    wet_sum += dry[2 * (frame - delay) + ch] * gain;
                }
            }
            buffer[idx] = dry[idx] * dry_gain + wet_sum * wet;
        }
    }
}

/// Flanger LFO rate in Hz
const FLANGER_LFO_HZ: f64 = 0.5;
/// Flanger base delay in seconds
const FLANGER_BASE_DELAY: f64 = 0.005;

/// LFO-modulated short delay mixed 50/50 with the dry signal.
///
/// Modulation depth is `intensity·0.8` of the 5 ms base delay; the LFO
/// phase is a pure function of the frame index.
pub fn flanger(buffer: &mut [f32], sample_rate: u32, intensity: f64) {
    let frames = buffer.len() / 2;
    if frames == 0 {
        return;
    }

    let base_delay = FLANGER_BASE_DELAY * sample_rate as f64;
    let depth = intensity * 0.8;
    let dry = buffer.to_vec();

    for frame in 0..frames {
        let lfo = (2.0 * std::f64::consts::PI * FLANGER_LFO_HZ * frame as f64
            / sample_rate as f64)
            .sin();
        let current_delay = (base_delay * (1.0 + lfo * depth)).max(0.0) as usize;

        for ch in 0..2 {
            let idx = 2 * frame + ch;
            if frame >= current_delay && current_delay > 0 {
                buffer[idx] = dry[idx] * 0.5 + dry[2 * (frame - current_delay) + ch] * 0.5;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Impulse at frame 0, both channels
    fn impulse(frames: usize) -> Vec<f32> {
        let mut buf = vec![0.0f32; frames * 2];
        buf[0] = 1.0;
        buf[1] = 1.0;
        buf
    }

    #[test]
    fn test_tap_delay_places_echo_at_tap() {
        let sample_rate = 44100;
        let mut buffer = impulse(sample_rate as usize); // 1 second
        tap_delay(&mut buffer, sample_rate, 250.0, 0.5, 0.5);

        let tap_frame = (0.25 * sample_rate as f64) as usize;
        // Dry impulse attenuated by (1 - mix)
        assert!((buffer[0] - 0.5).abs() < 1e-6);
        // Echo at the tap: impulse * feedback * mix
        assert!((buffer[2 * tap_frame] - 0.25).abs() < 1e-6);
        // Silence in between
        assert_eq!(buffer[2 * (tap_frame / 2)], 0.0);
    }

    #[test]
    fn test_tap_delay_longer_than_segment_is_noop() {
        let mut buffer = impulse(100);
        let original = buffer.clone();
        tap_delay(&mut buffer, 44100, 250.0, 0.5, 0.5);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_reverb_adds_tail() {
        let sample_rate = 44100;
        let mut buffer = impulse(sample_rate as usize / 4);
        reverb(&mut buffer, sample_rate, 0.5);

        // room_size = 0.55 at intensity 0.5; first tap lands at 13ms * 0.55
        let first_tap = (0.013 * sample_rate as f64 * 0.55) as usize;
        assert!(buffer[2 * first_tap].abs() > 0.1, "no tail at first tap");
    }

    #[test]
    fn test_flanger_mixes_delayed_copy() {
        let sample_rate = 44100;
        let frames = sample_rate as usize / 2;
        let mut buffer: Vec<f32> = (0..frames)
            .flat_map(|n| {
                let v = (2.0 * std::f64::consts::PI * 440.0 * n as f64 / sample_rate as f64)
                    .sin() as f32;
                [v, v]
            })
            .collect();
        let original = buffer.clone();
        flanger(&mut buffer, sample_rate, 0.7);

        assert!(buffer.iter().all(|s| s.is_finite()));
        let diff: f64 = buffer
            .iter()
            .zip(&original)
            .map(|(a, b)| (a - b).abs() as f64)
            .sum();
        assert!(diff > 1.0, "flanger did nothing");
    }
}
