//! TOML configuration for the grader and its command-line front end.

mod error;
mod load;
mod paths;
mod types;

pub use error::ConfigError;
pub use load::{load_config, LoadedConfig};
pub use paths::default_config_file;
pub use types::{DispatchConfig, GraderConfig, LoggingConfig, ProviderConfig};
