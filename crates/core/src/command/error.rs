//! Error types for command synthesis.

use thiserror::Error;

/// A command could not be built from the given inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The operation re-encodes video but no encoder was resolved.
    #[error("operation {operation} needs a resolved video encoder")]
    MissingEncoder { operation: &'static str },

    /// Merge was requested without a concat manifest.
    #[error("merge needs a concat manifest")]
    MissingConcatList,
}
