//! Error types for request validation.

use thiserror::Error;

/// A processing request that cannot be turned into a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// A required text field is empty.
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// Trim range is empty or inverted.
    #[error("invalid trim range: start {start_ms}ms must be before end {end_ms}ms")]
    InvalidRange { start_ms: u64, end_ms: u64 },

    /// A time lies outside the known source duration.
    #[error("{field} ({value_ms}ms) is beyond the source duration ({duration_ms}ms)")]
    BeyondDuration {
        field: &'static str,
        value_ms: u64,
        duration_ms: u64,
    },

    /// Both bitrate and CRF were given where only one is allowed.
    #[error("target bitrate and CRF are mutually exclusive")]
    ConflictingRateControl,

    /// A numeric knob is outside its allowed range.
    #[error("invalid {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    /// Unknown resolution preset name.
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    /// Merge needs at least two inputs.
    #[error("merge requires at least 2 inputs, got {0}")]
    NotEnoughInputs(usize),
}

impl RequestError {
    /// Creates an out-of-range error.
    pub fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}
