//! Serial media task orchestrator.
//!
//! Owns the task registry and FIFO queue and runs one encoder process at a
//! time:
//! - **Enqueue**: validated synchronously; refused when the engine is disabled
//!   or no encoder resolves for video work.
//! - **Run**: encoder resolution, manifest, argv synthesis and process
//!   supervision on a tokio task.
//! - **Control**: cancel, retry, remove, clear, subscribe.

mod config;
mod runner;
mod types;

pub use config::{EngineAvailability, OrchestratorConfig};
pub use runner::TaskOrchestrator;
pub use types::{
    EngineErrorCode, EnqueueError, OrchestratorError, QueueStatus, TaskEvent, TaskRecord,
    TaskStatus,
};
