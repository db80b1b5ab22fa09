use std::fs;
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::paths::default_config_file;
use super::types::GraderConfig;

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: GraderConfig,
    pub path: PathBuf,
    pub config_exists: bool,
}

/// Reads and validates the config. A missing file yields the defaults.
pub fn load_config(path_override: Option<PathBuf>) -> Result<LoadedConfig, ConfigError> {
    let path = match path_override {
        Some(path) => path,
        None => default_config_file()?,
    };
    let (config, config_exists) = read_config(&path)?;
    config.validate()?;
    log::debug!(
        "loaded config from {} (exists: {config_exists})",
        path.display()
    );
    Ok(LoadedConfig {
        config,
        path,
        config_exists,
    })
}

fn read_config(path: &Path) -> Result<(GraderConfig, bool), ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok((toml::from_str(&contents)?, true)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Ok((GraderConfig::default(), false))
        }
        Err(err) => Err(ConfigError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::resilient::BackoffSchedule;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(Some(dir.path().join("absent.toml"))).unwrap();
        assert!(!loaded.config_exists);
        assert_eq!(loaded.config.dispatch.max_workers, 4);
        assert_eq!(loaded.config.provider.model, "gpt-4o");
        assert_eq!(loaded.config.retry.max_attempts, 3);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config(
            r#"
            [provider]
            model = "gpt-4o-mini"

            [retry]
            max_attempts = 5
            schedule = { kind = "fixed", delays_ms = [10000, 20000, 30000] }

            [dispatch]
            max_workers = 8
            "#,
        );

        let loaded = load_config(Some(file.path().to_path_buf())).unwrap();
        let config = loaded.config;

        assert!(loaded.config_exists);
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.retry.schedule,
            BackoffSchedule::Fixed {
                delays_ms: vec![10_000, 20_000, 30_000]
            }
        );
        assert_eq!(config.dispatch.max_workers, 8);
        assert_eq!(config.dispatch.batch_size, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let file = write_config("[dispatch\nmax_workers = ");
        let err = load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let file = write_config("[dispatch]\nmax_workers = 64\n");
        let err = load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("max_workers")));
    }
}
