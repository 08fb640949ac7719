//! # Mixtape Planner
//!
//! Converts a vibe description plus an analyzed library into a fully timed
//! [`mixtape_common::DJSet`]. The planning oracle (an external LLM service)
//! supplies vibe analyses, track evaluations, and transition plans as
//! structured JSON; everything it returns is validated and repaired at the
//! boundary, with deterministic fallbacks when it misbehaves.
//!
//! Pipeline stages: vibe analysis → candidate selection → per-track
//! evaluation → energy-pattern ordering → transition planning → timing
//! materialization.

pub mod error;
pub mod oracle;
pub mod ordering;
pub mod planner;
pub mod selection;
pub mod timing;
pub mod transitions;

pub use error::{PlanError, Result};
pub use oracle::{
    HttpOracle, OracleClient, OracleError, OracleTransition, PlaylistFinalization,
    TrackEvaluation, VibeAnalysis,
};
pub use planner::{PlanRequest, PlanStage, SetPlanner};
