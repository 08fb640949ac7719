//! # Mixtape Analysis
//!
//! The track analysis engine and its supporting services:
//!
//! - [`analyzer`]: BPM and beat grid, musical key, energy, structural
//!   segmentation, and hot-cue synthesis from decoded audio
//! - [`queue`]: background analysis with a priority queue, a bounded
//!   worker pool, and an in-memory result cache
//! - [`store`]: the SQLite-backed library store for analyzed track records

pub mod analyzer;
pub mod decode;
pub mod error;
pub mod queue;
pub mod store;

pub use analyzer::{TrackAnalyzer, ANALYSIS_VERSION};
pub use error::{AnalysisError, Result};
pub use queue::{AnalysisKind, AnalysisQueue, AnalysisTask, Enqueued, TaskStatus};
pub use store::{Criteria, LibraryStore};

/// Canonical mono sample rate for feature extraction
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;
