use std::future::Future;
use std::sync::Arc;

use tokio::time::sleep;

use crate::{
    cache::FingerprintCache,
    chat::{CompletionProvider, CompletionRequest},
    checklist::Evaluation,
    error::GradeError,
    grade::Grade,
    parse::parse_evaluation,
    template::{render_single, SYSTEM_PROMPT},
};

use super::config::ResilienceConfig;

pub(crate) const DEFAULT_MODEL: &str = "gpt-4o";

/// Evaluates prompts against the provider, retrying rate-limited calls with backoff.
///
/// Successful evaluations go through the shared [`FingerprintCache`], so an
/// identical prompt is sent to the provider at most once.
pub struct ResilientInvoker {
    pub(super) provider: Arc<dyn CompletionProvider>,
    pub(super) cache: Arc<FingerprintCache>,
    pub(super) cfg: ResilienceConfig,
    pub(super) model: String,
    pub(super) temperature: f32,
}

impl ResilientInvoker {
    /// Creates an invoker using the default model at temperature 0.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        cache: Arc<FingerprintCache>,
        cfg: ResilienceConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            cfg,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn cache(&self) -> &Arc<FingerprintCache> {
        &self.cache
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.cfg
    }

    /// Evaluates one prompt.
    ///
    /// Persistent rate limiting yields `Ok(Grade::Throttled)`; any other failure
    /// is returned as an error without retrying. Cache hits skip the retry loop.
    pub async fn invoke(&self, prompt: &str) -> Result<Grade, GradeError> {
        let outcome = self
            .cache
            .get_or_insert(prompt, || self.evaluate_uncached(prompt))
            .await;
        match outcome {
            Ok(evaluation) => Ok(Grade::Scored(evaluation)),
            Err(GradeError::RetryExceeded { attempts, .. }) => Ok(Grade::Throttled { attempts }),
            Err(err) => Err(err),
        }
    }

    async fn evaluate_uncached(&self, prompt: &str) -> Result<Evaluation, GradeError> {
        let request = self.request(render_single(prompt));
        let raw = self.retry(|| self.provider.complete(&request)).await?;
        log::trace!("{} answer: {raw}", self.provider.name());
        parse_evaluation(&raw)
    }

    pub(super) fn request(&self, user: String) -> CompletionRequest {
        CompletionRequest::new(SYSTEM_PROMPT, user, self.model.as_str(), self.temperature)
    }

    /// Runs `op` until it succeeds, fails with a non-rate-limit error, or the
    /// attempt budget is spent. Exhaustion is reported as `RetryExceeded`.
    pub(super) async fn retry<F, Fut, T>(&self, mut op: F) -> Result<T, GradeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GradeError>>,
    {
        let max_attempts = self.cfg.attempts();
        let mut idx = 0usize;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_rate_limited() => return Err(err),
                Err(err) => {
                    if idx + 1 >= max_attempts {
                        log::warn!(
                            "{} still rate limited after {max_attempts} attempts",
                            self.provider.name()
                        );
                        return Err(GradeError::RetryExceeded {
                            attempts: max_attempts,
                            last_error: err.to_string(),
                        });
                    }
                    let delay = self.cfg.backoff(idx, err.retry_after());
                    log::warn!(
                        "{} rate limited (attempt {}/{max_attempts}), retrying in {}ms",
                        self.provider.name(),
                        idx + 1,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    idx += 1;
                }
            }
        }
    }
}
