use std::path::PathBuf;

use super::error::ConfigError;

/// `~/.config/prompt-grader/config.toml`
pub fn default_config_file() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::MissingHome)?;
    Ok(home
        .join(".config")
        .join("prompt-grader")
        .join("config.toml"))
}
