//! Trait definitions for the process layer.

use async_trait::async_trait;

use super::error::ProcessError;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Starts encoder processes.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Program name used when rendering commands for logs.
    fn program(&self) -> String;

    /// Spawns the encoder with `args`; stderr is exposed line by line.
    async fn spawn(&self, args: &[String]) -> Result<Box<dyn RunningProcess>, ProcessError>;
}

/// A live encoder process.
#[async_trait]
pub trait RunningProcess: Send {
    /// Next log line from stderr; `None` once the stream is closed.
    async fn next_line(&mut self) -> Option<String>;

    /// Waits for the process to exit.
    async fn wait(&mut self) -> Result<ProcessExit, ProcessError>;

    /// Terminates the process. Killing an exited process is not an error.
    async fn kill(&mut self) -> Result<(), ProcessError>;
}
