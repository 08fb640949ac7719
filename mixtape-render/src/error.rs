//! Error types for the renderer

use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors raised while rendering a set
#[derive(Debug, Error)]
pub enum RenderError {
    /// Source audio cannot be read or decoded. Non-fatal per track: the
    /// renderer skips the track and keeps going.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Output buffer cannot be allocated. Fatal for the request.
    #[error("Cannot allocate output buffer of {frames} frames")]
    Allocation { frames: usize },

    /// The set fails structural validation before rendering starts.
    #[error("Invalid set: {0}")]
    InvalidSet(String),

    /// Resampler construction or processing failed
    #[error("Resampling error: {0}")]
    Resample(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
