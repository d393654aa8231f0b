//! File registry that keeps outputs where the encoder wrote them.

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use mediatask_core::{FileRegistry, RegistryError};

/// Accepts any non-empty output and uses its path as the file id.
#[derive(Debug, Default, Clone)]
pub struct LocalFileRegistry;

impl LocalFileRegistry {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileRegistry for LocalFileRegistry {
    async fn register_output(
        &self,
        source_id: &str,
        output_path: &Path,
    ) -> Result<String, RegistryError> {
        let metadata = tokio::fs::metadata(output_path).await?;
        if metadata.len() == 0 {
            return Err(RegistryError::Rejected(format!(
                "{} is empty",
                output_path.display()
            )));
        }

        info!(
            "Registered {} ({} bytes) derived from {}",
            output_path.display(),
            metadata.len(),
            source_id
        );
        Ok(output_path.display().to_string())
    }
}
