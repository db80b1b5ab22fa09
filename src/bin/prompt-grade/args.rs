use std::path::PathBuf;

use clap::Parser;
use prompt_grader::config::GraderConfig;

#[derive(Parser, Debug)]
#[command(
    name = "prompt-grade",
    about = "Grade student-written prompts against the ten-item checklist"
)]
pub struct CliArgs {
    /// Prompts file: one prompt per line, or a JSON array of strings. Reads stdin when omitted.
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
    #[arg(long, short = 'm')]
    pub model: Option<String>,
    /// Falls back to the variable named by `provider.api_key_env`
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub base_url: Option<String>,
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Send several prompts per request
    #[arg(long)]
    pub batched: bool,
    /// Print aggregate counts to stderr when done
    #[arg(long)]
    pub summary: bool,
    #[arg(long)]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Command-line flags win over the config file.
    pub fn apply_overrides(&self, config: &mut GraderConfig) {
        if let Some(model) = &self.model {
            config.provider.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.provider.base_url = Some(base_url.clone());
        }
        if let Some(workers) = self.workers {
            config.dispatch.max_workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.dispatch.batch_size = batch_size;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }

    pub fn api_key(&self, config: &GraderConfig) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&config.provider.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}
