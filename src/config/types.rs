use serde::{Deserialize, Serialize};

use crate::resilient::{BackoffSchedule, ResilienceConfig};

use super::error::ConfigError;

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_BATCH_SIZE: usize = 5;
const DEFAULT_INTER_BATCH_WAIT_MS: u64 = 5_000;
const MAX_WORKERS_LIMIT: usize = 32;
const DEFAULT_LOG_ROTATE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_LOG_ROTATE_KEEP: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GraderConfig {
    pub provider: ProviderConfig,
    pub retry: ResilienceConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub timeout_seconds: Option<u64>,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            temperature: 0.0,
            timeout_seconds: Some(DEFAULT_TIMEOUT_SECONDS),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_workers: usize,
    pub batch_size: usize,
    pub inter_batch_wait_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_wait_ms: DEFAULT_INTER_BATCH_WAIT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file; stderr when unset
    pub path: Option<String>,
    pub rotate_size: u64,
    pub rotate_keep: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
            rotate_size: DEFAULT_LOG_ROTATE_SIZE,
            rotate_keep: DEFAULT_LOG_ROTATE_KEEP,
        }
    }
}

impl GraderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dispatch = &self.dispatch;
        if !(1..=MAX_WORKERS_LIMIT).contains(&dispatch.max_workers) {
            return Err(invalid(format!(
                "dispatch.max_workers must be between 1 and {MAX_WORKERS_LIMIT}, got {}",
                dispatch.max_workers
            )));
        }
        if dispatch.batch_size == 0 {
            return Err(invalid("dispatch.batch_size must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if let BackoffSchedule::Fixed { delays_ms } = &self.retry.schedule {
            if delays_ms.is_empty() {
                return Err(invalid("retry.schedule.delays_ms must not be empty"));
            }
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(invalid(format!(
                "provider.temperature must be between 0 and 2, got {}",
                self.provider.temperature
            )));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        assert!(GraderConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case("[dispatch]\nmax_workers = 0", "max_workers")]
    #[case("[dispatch]\nmax_workers = 33", "max_workers")]
    #[case("[dispatch]\nbatch_size = 0", "batch_size")]
    #[case("[retry]\nmax_attempts = 0", "max_attempts")]
    #[case("[retry]\nschedule = { kind = \"fixed\", delays_ms = [] }", "delays_ms")]
    #[case("[provider]\ntemperature = 2.5", "temperature")]
    fn rejects_out_of_range(#[case] toml_text: &str, #[case] field: &str) {
        let config: GraderConfig = toml::from_str(toml_text).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(field), "{err}");
    }
}
