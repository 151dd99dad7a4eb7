use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::PrerollConfig, ConfigError};

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<PrerollConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: PrerollConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("PREROLL_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<PrerollConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.buffer_size, 3);
        assert_eq!(config.admission_slack, 1);
    }

    #[test]
    fn test_load_config_from_str_full() {
        let toml = r#"
            buffer_size = 5
            admission_slack = 0
            inclusive_backpressure = true
        "#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.buffer_size, 5);
        assert_eq!(config.admission_slack, 0);
        assert!(config.inclusive_backpressure);
    }

    #[test]
    fn test_load_config_from_str_invalid() {
        let result = load_config_from_str("buffer_size = \"lots\"");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/preroll.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
buffer_size = 2
admission_slack = 1
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.buffer_size, 2);
        assert_eq!(config.capacity(), 3);
    }
}
