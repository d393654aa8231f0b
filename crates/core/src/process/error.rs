//! Error types for the process layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while starting or supervising an encoder process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The encoder binary does not exist.
    #[error("encoder binary not found at path: {path}")]
    NotFound { path: PathBuf },

    /// The process could not be started.
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while reading output or waiting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    /// Maps a spawn-time I/O error, distinguishing a missing binary.
    pub fn from_spawn(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Spawn { path, source: err }
        }
    }
}
