//! Types for the task orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::capabilities::EncoderSelection;
use crate::request::{ProcessingRequest, RequestError};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and failed tasks never change state again, except through retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Machine-readable reason a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorCode {
    /// The encoder binary is missing.
    ExecutorUnavailable,
    /// The encoder could not be started for another reason.
    SpawnFailed,
    /// The encoder exited with a nonzero code, or was killed by a signal (`None`).
    Exit(Option<i32>),
    Cancelled,
    Timeout,
    ManifestFailed,
    OutputRegistrationFailed,
    /// No encoder could be resolved when the task started.
    EncoderUnavailable,
}

impl EngineErrorCode {
    pub fn as_code(&self) -> String {
        match self {
            Self::ExecutorUnavailable => "ffmpeg_executor_unavailable".to_string(),
            Self::SpawnFailed => "spawn_failed".to_string(),
            Self::Exit(Some(code)) => format!("ffmpeg_exit_{}", code),
            Self::Exit(None) => "ffmpeg_exit_signal".to_string(),
            Self::Cancelled => "cancelled".to_string(),
            Self::Timeout => "timeout".to_string(),
            Self::ManifestFailed => "manifest_failed".to_string(),
            Self::OutputRegistrationFailed => "output_registration_failed".to_string(),
            Self::EncoderUnavailable => "encoder_unavailable".to_string(),
        }
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_code())
    }
}

/// Everything known about one task. Updates replace the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub request: ProcessingRequest,
    pub status: TaskStatus,
    /// Fraction in `[0, 1]`; never decreases while running.
    pub progress: f64,
    /// Output time reached by the encoder.
    pub processed_ms: u64,
    /// Expected output duration, when known.
    pub duration_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Registry ids of produced files.
    pub output_file_ids: Vec<String>,
    pub retries: u32,
    /// Most recent encoder log lines and engine notes.
    pub log_lines: Vec<String>,
    pub error: Option<String>,
    pub engine_error_code: Option<String>,
    /// Encoder used by the latest run.
    pub encoder: Option<EncoderSelection>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, request: ProcessingRequest) -> Self {
        let duration_ms = request.expected_duration_ms();
        Self {
            id: id.into(),
            request,
            status: TaskStatus::Pending,
            progress: 0.0,
            processed_ms: 0,
            duration_ms,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            output_file_ids: Vec::new(),
            retries: 0,
            log_lines: Vec::new(),
            error: None,
            engine_error_code: None,
            encoder: None,
        }
    }

    /// Appends a log line, dropping the oldest beyond `max_lines`.
    pub fn push_log(&mut self, line: impl Into<String>, max_lines: usize) {
        self.log_lines.push(line.into());
        if self.log_lines.len() > max_lines {
            let excess = self.log_lines.len() - max_lines;
            self.log_lines.drain(..excess);
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn complete(&mut self, output_file_ids: Vec<String>) {
        self.status = TaskStatus::Completed;
        self.progress = 1.0;
        if let Some(duration) = self.duration_ms {
            self.processed_ms = self.processed_ms.max(duration);
        }
        self.output_file_ids = output_file_ids;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, code: EngineErrorCode, message: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(message.into());
        self.engine_error_code = Some(code.as_code());
        self.finished_at = Some(Utc::now());
    }

    /// Returns a failed record to pending for another run.
    pub(crate) fn reset_for_retry(&mut self) {
        self.status = TaskStatus::Pending;
        self.progress = 0.0;
        self.processed_ms = 0;
        self.retries += 1;
        self.started_at = None;
        self.finished_at = None;
        self.output_file_ids.clear();
        self.error = None;
        self.engine_error_code = None;
        self.encoder = None;
    }
}

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A record was created or replaced.
    Updated(TaskRecord),
    /// A record was deleted.
    Removed { id: String },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Updated(record) => &record.id,
            Self::Removed { id } => id,
        }
    }
}

/// Queue counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Whether the engine accepts new work.
    pub accepting: bool,
    pub pending_count: usize,
    pub running_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    /// Id of the running task.
    pub current_task: Option<String>,
}

/// Errors returned synchronously by `enqueue`; no task is created.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("invalid request: {0}")]
    Validation(#[from] RequestError),

    #[error("media engine unavailable: {0}")]
    EngineUnavailable(String),
}

/// Rejections of caller operations on existing tasks.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Task not found.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// Invalid task state for operation.
    #[error("invalid task state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// The retry budget is spent.
    #[error("task {id} reached the retry limit ({max})")]
    RetryLimitReached { id: String, max: u32 },

    /// The task failed too recently.
    #[error("task {id} can be retried in {remaining_ms} ms")]
    RetryTooSoon { id: String, remaining_ms: u64 },
}

impl OrchestratorError {
    pub(crate) fn invalid_state(expected: &str, actual: TaskStatus) -> Self {
        Self::InvalidState {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
