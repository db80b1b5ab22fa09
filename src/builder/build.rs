use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::{
    backends::openai::OpenAI,
    cache::FingerprintCache,
    chat::CompletionProvider,
    error::GradeError,
    evaluator::BatchEvaluator,
    resilient::ResilientInvoker,
};

use super::grader_builder::GraderBuilder;
use super::state::BuilderState;

impl GraderBuilder {
    pub fn build(self) -> Result<BatchEvaluator, GradeError> {
        self.state.build()
    }
}

impl BuilderState {
    fn build(mut self) -> Result<BatchEvaluator, GradeError> {
        self.log_state();
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(GradeError::InvalidRequest(format!(
                    "temperature must be between 0 and 2, got {temperature}"
                )));
            }
        }

        let provider = match self.provider.take() {
            Some(provider) => provider,
            None => self.build_openai()?,
        };
        let cache = self
            .cache
            .take()
            .unwrap_or_else(|| Arc::new(FingerprintCache::new()));

        let mut invoker = ResilientInvoker::new(provider, cache, self.retry);
        if let Some(model) = self.model {
            invoker = invoker.with_model(model);
        }
        if let Some(temperature) = self.temperature {
            invoker = invoker.with_temperature(temperature);
        }

        let mut evaluator = BatchEvaluator::new(Arc::new(invoker));
        if let Some(max_workers) = self.max_workers {
            evaluator = evaluator.with_max_workers(max_workers);
        }
        if let Some(batch_size) = self.batch_size {
            evaluator = evaluator.with_batch_size(batch_size);
        }
        if let Some(wait) = self.inter_batch_wait {
            evaluator = evaluator.with_inter_batch_wait(wait);
        }
        if let Some(token) = self.cancel {
            evaluator = evaluator.with_cancellation(token);
        }
        Ok(evaluator)
    }

    fn build_openai(&mut self) -> Result<Arc<dyn CompletionProvider>, GradeError> {
        let Some(key) = self.api_key.take() else {
            return Err(GradeError::AuthError(
                "No API key provided for OpenAI".to_string(),
            ));
        };
        let openai = OpenAI::new(
            key.expose_secret().as_str(),
            self.base_url.take(),
            self.timeout_seconds,
        )?;
        Ok(Arc::new(openai))
    }

    fn log_state(&self) {
        log::debug!(
            "Building grader. provider={} model={:?} temp={:?} attempts={} workers={:?} batch_size={:?}",
            if self.provider.is_some() { "custom" } else { "openai" },
            self.model,
            self.temperature,
            self.retry.max_attempts,
            self.max_workers,
            self.batch_size,
        );
    }
}
