use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use crate::{
    cache::FingerprintCache, chat::CompletionProvider, config::GraderConfig,
};

use super::state::BuilderState;

/// Builder for configuring and assembling a [`BatchEvaluator`](crate::BatchEvaluator).
pub struct GraderBuilder {
    pub(super) state: BuilderState,
}

impl Default for GraderBuilder {
    fn default() -> Self {
        Self {
            state: BuilderState::default(),
        }
    }
}

impl GraderBuilder {
    /// Creates a new empty builder instance with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the builder from a loaded config. The API key is not part of it.
    pub fn from_config(config: &GraderConfig) -> Self {
        let provider = &config.provider;
        let mut builder = Self::new()
            .model(provider.model.as_str())
            .temperature(provider.temperature)
            .retry(config.retry.clone())
            .max_workers(config.dispatch.max_workers)
            .batch_size(config.dispatch.batch_size)
            .inter_batch_wait(Duration::from_millis(config.dispatch.inter_batch_wait_ms));
        if let Some(base_url) = &provider.base_url {
            builder = builder.base_url(base_url.as_str());
        }
        if let Some(timeout) = provider.timeout_seconds {
            builder = builder.timeout_seconds(timeout);
        }
        builder
    }

    /// Sets the API key for the OpenAI backend.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.state.api_key = Some(SecretString::new(key.into()));
        self
    }

    /// Sets the base URL for API requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.state.base_url = Some(url.into());
        self
    }

    /// Sets the model identifier to use.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.state.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature (0.0-2.0).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.state.temperature = Some(temperature);
        self
    }

    /// Sets the request timeout in seconds.
    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.state.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Uses `provider` instead of building the OpenAI backend.
    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.state.provider = Some(provider);
        self
    }

    /// Shares an existing cache instead of starting with an empty one.
    pub fn cache(mut self, cache: Arc<FingerprintCache>) -> Self {
        self.state.cache = Some(cache);
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.state.max_workers = Some(max_workers);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.state.batch_size = Some(batch_size);
        self
    }

    pub fn inter_batch_wait(mut self, wait: Duration) -> Self {
        self.state.inter_batch_wait = Some(wait);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.state.cancel = Some(token);
        self
    }
}
