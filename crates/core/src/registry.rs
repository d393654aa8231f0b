//! Boundary to the host application's file registry.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors reported by a file registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry refused the artifact.
    #[error("output rejected: {0}")]
    Rejected(String),

    /// I/O error while inspecting the artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Records produced artifacts and hands back their ids.
#[async_trait]
pub trait FileRegistry: Send + Sync {
    /// Registers one produced file derived from `source_id`.
    async fn register_output(&self, source_id: &str, output_path: &Path)
        -> Result<String, RegistryError>;
}
