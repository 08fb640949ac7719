//! Short-time Fourier transform helpers
//!
//! Shared spectral front end for onset detection, chroma features, and
//! structural analysis. Frames are Hann-windowed with a fixed hop.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// FFT size for all analysis features
pub const N_FFT: usize = 1024;

/// Hop between analysis frames
pub const HOP: usize = 512;

/// Analysis frames per second at the given rate
pub fn frames_per_second(sample_rate: u32) -> f64 {
    sample_rate as f64 / HOP as f64
}

/// Magnitude spectrogram: one `N_FFT/2 + 1` bin row per frame.
pub fn magnitude_spectrogram(samples: &[f32]) -> Vec<Vec<f32>> {
    if samples.len() < N_FFT {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(N_FFT);

    let window: Vec<f32> = (0..N_FFT)
        .map(|n| {
            let x = std::f32::consts::PI * n as f32 / (N_FFT - 1) as f32;
            x.sin() * x.sin()
        })
        .collect();

    let bins = N_FFT / 2 + 1;
    let frame_count = (samples.len() - N_FFT) / HOP + 1;
    let mut frames = Vec::with_capacity(frame_count);
    let mut buffer = vec![Complex::new(0.0f32, 0.0f32); N_FFT];

    for frame_idx in 0..frame_count {
        let start = frame_idx * HOP;
        for (n, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(samples[start + n] * window[n], 0.0);
        }
        fft.process(&mut buffer);
        frames.push(buffer[..bins].iter().map(|c| c.norm()).collect());
    }

    frames
}

/// Center frequency of a spectrogram bin.
pub fn bin_frequency(bin: usize, sample_rate: u32) -> f64 {
    bin as f64 * sample_rate as f64 / N_FFT as f64
}

/// Fold one magnitude frame into a 12-bin pitch-class chroma vector.
///
/// Bins below A0 or in the top tenth of the spectrum are ignored; pitch
/// class 0 is C.
pub fn frame_chroma(magnitudes: &[f32], sample_rate: u32) -> [f32; 12] {
    let mut chroma = [0.0f32; 12];
    let max_freq = sample_rate as f64 / 2.0 * 0.9;

    for (bin, &mag) in magnitudes.iter().enumerate() {
        let freq = bin_frequency(bin, sample_rate);
        if freq < 27.5 || freq > max_freq {
            continue;
        }
        // MIDI note number; note % 12 == 0 is C
        let midi = 69.0 + 12.0 * (freq / 440.0).log2();
        let pitch_class = (midi.round() as i64).rem_euclid(12) as usize;
        chroma[pitch_class] += mag * mag;
    }

    chroma
}

/// Spectral centroid of one magnitude frame, in Hz.
pub fn frame_centroid(magnitudes: &[f32], sample_rate: u32) -> f64 {
    let mut weighted = 0.0f64;
    let mut total = 0.0f64;
    for (bin, &mag) in magnitudes.iter().enumerate() {
        weighted += bin_frequency(bin, sample_rate) * mag as f64;
        total += mag as f64;
    }
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}
