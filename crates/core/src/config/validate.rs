use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - ffmpeg path is not empty
/// - log line and event buffers are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.engine.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.ffmpeg_path cannot be empty".to_string(),
        ));
    }

    if config.queue.max_log_lines == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_log_lines cannot be 0".to_string(),
        ));
    }

    if config.queue.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "queue.event_buffer cannot be 0".to_string(),
        ));
    }

    Ok(())
}
