//! Error types for the analysis engine

use thiserror::Error;

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised while analyzing tracks.
///
/// Analysis errors are recorded on the owning task and reported; they are
/// never unwound past the queue. A failed sub-analysis (key detection) is
/// not an error at this level: defaults are substituted and the record is
/// stored anyway.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Source audio cannot be read or decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Tracks shorter than the minimum are not analyzable
    #[error("Track too short for analysis: {seconds:.1}s")]
    TooShort { seconds: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record failed to deserialize or validate
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A query used an unsupported field or operator
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),
}
