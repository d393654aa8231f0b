//! Mock process spawner for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::process::{ProcessError, ProcessExit, ProcessSpawner, RunningProcess};

/// Mock implementation of the ProcessSpawner trait.
///
/// Every spawned process replays the configured stderr lines and then exits
/// with the configured code. In hold mode the process keeps running after
/// its lines until it is killed. With a stuck exit the process closes
/// stderr but never exits on its own.
///
/// # Example
///
/// ```rust,ignore
/// let spawner = MockSpawner::new();
/// spawner.set_lines(["frame=1 time=00:00:05.000"]).await;
/// spawner.set_exit_code(0).await;
///
/// // ... run a task ...
///
/// let argv = spawner.spawned_args().await;
/// assert!(argv[0].contains(&"-an".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct MockSpawner {
    /// Argument lists of every spawn attempt.
    spawned: Arc<RwLock<Vec<Vec<String>>>>,
    lines: Arc<RwLock<Vec<String>>>,
    exit_code: Arc<RwLock<i32>>,
    hold_until_killed: Arc<RwLock<bool>>,
    stuck_exit: Arc<RwLock<bool>>,
    line_delay: Arc<RwLock<Option<Duration>>>,
    /// If set, the next spawn fails with this error.
    next_error: Arc<RwLock<Option<ProcessError>>>,
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// Create a spawner whose processes exit 0 without output.
    pub fn new() -> Self {
        Self {
            spawned: Arc::new(RwLock::new(Vec::new())),
            lines: Arc::new(RwLock::new(Vec::new())),
            exit_code: Arc::new(RwLock::new(0)),
            hold_until_killed: Arc::new(RwLock::new(false)),
            stuck_exit: Arc::new(RwLock::new(false)),
            line_delay: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the stderr lines replayed by subsequent processes.
    pub async fn set_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.lines.write().await = lines.into_iter().map(Into::into).collect();
    }

    pub async fn set_exit_code(&self, code: i32) {
        *self.exit_code.write().await = code;
    }

    /// Keep processes alive after their lines until killed.
    pub async fn set_hold_until_killed(&self, hold: bool) {
        *self.hold_until_killed.write().await = hold;
    }

    /// Close stderr after the lines but never exit until killed.
    pub async fn set_stuck_exit(&self, stuck: bool) {
        *self.stuck_exit.write().await = stuck;
    }

    /// Pause before each replayed line.
    pub async fn set_line_delay(&self, delay: Duration) {
        *self.line_delay.write().await = Some(delay);
    }

    /// Configure the next spawn to fail with the given error.
    pub async fn set_next_error(&self, error: ProcessError) {
        *self.next_error.write().await = Some(error);
    }

    /// Argument lists of every spawn attempt, oldest first.
    pub async fn spawned_args(&self) -> Vec<Vec<String>> {
        self.spawned.read().await.clone()
    }

    pub async fn spawn_count(&self) -> usize {
        self.spawned.read().await.len()
    }
}

#[async_trait]
impl ProcessSpawner for MockSpawner {
    fn program(&self) -> String {
        "ffmpeg".to_string()
    }

    async fn spawn(&self, args: &[String]) -> Result<Box<dyn RunningProcess>, ProcessError> {
        self.spawned.write().await.push(args.to_vec());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(Box::new(MockProcess {
            lines: self.lines.read().await.iter().cloned().collect(),
            exit_code: *self.exit_code.read().await,
            hold: *self.hold_until_killed.read().await,
            stuck_exit: *self.stuck_exit.read().await,
            line_delay: *self.line_delay.read().await,
            killed: false,
        }))
    }
}

/// A scripted process.
#[derive(Debug)]
struct MockProcess {
    lines: VecDeque<String>,
    exit_code: i32,
    hold: bool,
    stuck_exit: bool,
    line_delay: Option<Duration>,
    killed: bool,
}

#[async_trait]
impl RunningProcess for MockProcess {
    async fn next_line(&mut self) -> Option<String> {
        if self.killed {
            return None;
        }
        if let Some(delay) = self.line_delay {
            if !self.lines.is_empty() {
                tokio::time::sleep(delay).await;
            }
        }
        match self.lines.pop_front() {
            Some(line) => Some(line),
            None if self.hold => std::future::pending().await,
            None => None,
        }
    }

    async fn wait(&mut self) -> Result<ProcessExit, ProcessError> {
        if self.stuck_exit && !self.killed {
            std::future::pending::<()>().await;
        }
        let code = if self.killed { None } else { Some(self.exit_code) };
        Ok(ProcessExit { code })
    }

    async fn kill(&mut self) -> Result<(), ProcessError> {
        self.killed = true;
        Ok(())
    }
}
