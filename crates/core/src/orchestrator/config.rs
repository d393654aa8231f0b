//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::command::CommandOptions;
use crate::config::Config;

/// Whether the engine accepts work at all.
///
/// Injected at construction; a disabled engine refuses every enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAvailability {
    pub enabled: bool,
    /// Reported to callers when disabled.
    pub reason: Option<String>,
}

impl EngineAvailability {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            reason: None,
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            enabled: false,
            reason: Some(reason.into()),
        }
    }

    /// Message returned when enqueue is refused.
    pub fn refusal(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| "media engine is disabled".to_string())
    }
}

impl Default for EngineAvailability {
    fn default() -> Self {
        Self::enabled()
    }
}

/// Runtime settings for the task orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory for concat manifests.
    pub cache_dir: PathBuf,
    /// Directory receiving produced files.
    pub output_dir: PathBuf,
    /// Global encoder arguments.
    pub command: CommandOptions,
    /// Encoder log lines kept per task.
    pub max_log_lines: usize,
    /// Wall-clock limit for one encoder run.
    pub max_task_duration: Option<Duration>,
    /// Manual retries allowed per task; `None` is unlimited.
    pub max_retries: Option<u32>,
    /// Minimum delay between a failure and an accepted retry.
    pub retry_cooldown: Duration,
    /// Capacity of the event channel.
    pub event_buffer: usize,
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        let max_task_duration = match config.queue.max_task_duration_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            cache_dir: config.paths.cache_dir.clone(),
            output_dir: config.paths.output_dir.clone(),
            command: CommandOptions {
                log_level: config.engine.ffmpeg_log_level.clone(),
                extra_args: config.engine.extra_ffmpeg_args.clone(),
            },
            max_log_lines: config.queue.max_log_lines,
            max_task_duration,
            max_retries: config.queue.max_retries,
            retry_cooldown: Duration::from_millis(config.queue.retry_cooldown_ms),
            event_buffer: config.queue.event_buffer,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl From<&Config> for EngineAvailability {
    fn from(config: &Config) -> Self {
        if config.engine.enabled {
            Self::enabled()
        } else {
            Self::disabled("media engine disabled by configuration")
        }
    }
}
