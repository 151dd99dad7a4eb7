use super::{types::PrerollConfig, ConfigError};

/// Validate configuration
/// Currently validates:
/// - `buffer_size` is at least 1 (a zero window can never admit anything)
pub fn validate_config(config: &PrerollConfig) -> Result<(), ConfigError> {
    if config.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "buffer_size cannot be 0".to_string(),
        ));
    }

    Ok(())
}
