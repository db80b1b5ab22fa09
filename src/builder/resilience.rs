use crate::resilient::{BackoffSchedule, ResilienceConfig};

use super::grader_builder::GraderBuilder;

impl GraderBuilder {
    /// Replaces the whole retry policy.
    pub fn retry(mut self, config: ResilienceConfig) -> Self {
        self.state.retry = config;
        self
    }

    /// Sets the number of attempts per request, including the first.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.state.retry.max_attempts = attempts;
        self
    }

    /// Sets the delay schedule between rate-limited attempts.
    pub fn backoff(mut self, schedule: BackoffSchedule) -> Self {
        self.state.retry.schedule = schedule;
        self
    }

    /// Sets the upper bound on a single backoff delay.
    pub fn max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.state.retry.max_delay_ms = max_delay_ms;
        self
    }

    /// Sets jitter toggle for backoff.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.state.retry.jitter = jitter;
        self
    }
}
