use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::capabilities::Platform;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Encoder engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Feature flag; when false every enqueue is refused.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    /// Platform override; detected from the build target when unset.
    #[serde(default)]
    pub platform: Option<Platform>,
    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,
    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ffmpeg_path: default_ffmpeg_path(),
            platform: None,
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Working directories
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Transient files such as concat manifests.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Where produced artifacts are written before registration.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("mediatask")
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("mediatask").join("output")
}

/// Task queue policies
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Encoder log lines kept per task.
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines: usize,
    /// A running task is killed after this many seconds (0 = no limit).
    #[serde(default = "default_max_task_duration")]
    pub max_task_duration_secs: u64,
    /// Maximum manual retries per task (unset = unlimited).
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Minimum time between a failure and an accepted retry.
    #[serde(default)]
    pub retry_cooldown_ms: u64,
    /// Capacity of the task event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_log_lines: default_max_log_lines(),
            max_task_duration_secs: default_max_task_duration(),
            max_retries: None,
            retry_cooldown_ms: 0,
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_max_log_lines() -> usize {
    200
}

fn default_max_task_duration() -> u64 {
    3600 // 1 hour
}

fn default_event_buffer() -> usize {
    256
}
