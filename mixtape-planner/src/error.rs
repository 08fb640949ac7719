//! Error types for the planner

use crate::oracle::OracleError;
use thiserror::Error;

/// Result type alias for planning operations
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors raised while planning a set
#[derive(Debug, Error)]
pub enum PlanError {
    /// The oracle failed beyond its retry and fallback budget
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Fewer than two viable candidates survived selection. Fatal for the
    /// request; there is nothing to mix.
    #[error("Insufficient library: {found} viable candidate(s)")]
    InsufficientLibrary { found: usize },

    #[error("Store error: {0}")]
    Store(#[from] mixtape_analysis::AnalysisError),

    /// The caller cancelled; checked at stage boundaries
    #[error("Plan request cancelled")]
    Cancelled,

    /// A produced set failed its own validation (a planner bug)
    #[error("Planning error: {0}")]
    Internal(String),
}
