//! # Mixtape Renderer
//!
//! Deterministically mixes a planned [`mixtape_common::DJSet`] into a single
//! stereo PCM stream and serializes it as 16-bit WAV:
//!
//! - Decode each source file (symphonia) and resample to canonical
//!   44.1 kHz stereo (rubato)
//! - Extract the planned hot-cue segment, apply per-track gain and 3-band EQ
//! - Apply crossfade curves and time-scheduled DSP effects at transitions
//! - Additively mix into the output buffer, normalize, write WAV
//!
//! Given the same set and the same source bytes the output is bit-identical:
//! no wall clock, no randomness anywhere in this crate.

pub mod decode;
pub mod dsp;
pub mod effects;
pub mod eq;
pub mod error;
pub mod renderer;
pub mod resampler;
pub mod wav;

pub use error::{RenderError, Result};
pub use renderer::{RenderedSet, SetRenderer};

/// Canonical output sample rate
pub const SAMPLE_RATE: u32 = 44100;

/// Canonical output channel count
pub const CHANNELS: u16 = 2;
