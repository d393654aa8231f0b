//! Mock file registry for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::registry::{FileRegistry, RegistryError};

/// A recorded registration for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOutput {
    pub source_id: String,
    pub output_path: PathBuf,
    /// Id handed back to the orchestrator.
    pub file_id: String,
}

/// Mock implementation of the FileRegistry trait.
///
/// Hands out sequential ids (`file-1`, `file-2`, ...) and records every
/// registration. Can be told to reject the next call.
#[derive(Debug, Clone, Default)]
pub struct MockFileRegistry {
    registered: Arc<RwLock<Vec<RecordedOutput>>>,
    /// If set, the next registration fails with this message.
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded registrations.
    pub async fn registered(&self) -> Vec<RecordedOutput> {
        self.registered.read().await.clone()
    }

    /// Configure the next registration to fail.
    pub async fn set_next_error(&self, message: impl Into<String>) {
        *self.next_error.write().await = Some(message.into());
    }
}

#[async_trait]
impl FileRegistry for MockFileRegistry {
    async fn register_output(
        &self,
        source_id: &str,
        output_path: &Path,
    ) -> Result<String, RegistryError> {
        if let Some(message) = self.next_error.write().await.take() {
            return Err(RegistryError::Rejected(message));
        }

        let mut registered = self.registered.write().await;
        let file_id = format!("file-{}", registered.len() + 1);
        registered.push(RecordedOutput {
            source_id: source_id.to_string(),
            output_path: output_path.to_path_buf(),
            file_id: file_id.clone(),
        });
        Ok(file_id)
    }
}
