use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How long to wait before each retry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffSchedule {
    /// `base * 2^n` for the n-th retry
    Exponential { base_delay_ms: u64 },
    /// `base * attempt_number`
    Linear { base_delay_ms: u64 },
    /// Explicit escalating delays; the last entry repeats
    Fixed { delays_ms: Vec<u64> },
}

impl BackoffSchedule {
    /// Delay before retry number `retry_index` (0 for the first retry).
    pub fn delay_ms(&self, retry_index: usize) -> u64 {
        match self {
            BackoffSchedule::Exponential { base_delay_ms } => {
                base_delay_ms.saturating_mul(1u64 << retry_index.min(16))
            }
            BackoffSchedule::Linear { base_delay_ms } => {
                base_delay_ms.saturating_mul(retry_index as u64 + 1)
            }
            BackoffSchedule::Fixed { delays_ms } => delays_ms
                .get(retry_index)
                .or_else(|| delays_ms.last())
                .copied()
                .unwrap_or(0),
        }
    }
}

/// Configuration for retry and backoff behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Maximum number of attempts including the first one
    pub max_attempts: usize,
    /// Delay schedule between attempts
    pub schedule: BackoffSchedule,
    /// Maximum backoff delay in milliseconds
    pub max_delay_ms: u64,
    /// Whether to add random jitter to backoff delays
    pub jitter: bool,
}

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 10_000;
const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ResilienceConfig {
    /// Three attempts, waiting 10s then 20s on rate limits.
    pub fn defaults() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            schedule: BackoffSchedule::Linear {
                base_delay_ms: DEFAULT_BASE_DELAY_MS,
            },
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter: false,
        }
    }

    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::defaults()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_schedule(mut self, schedule: BackoffSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Attempts actually made; zero is treated as one.
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Wait before retry `retry_index`, honoring a provider hint and the cap.
    pub fn backoff(&self, retry_index: usize, hint: Option<Duration>) -> Duration {
        let mut delay = self.schedule.delay_ms(retry_index);
        if let Some(hint) = hint {
            delay = delay.max(u64::try_from(hint.as_millis()).unwrap_or(u64::MAX));
        }
        delay = delay.min(self.max_delay_ms);
        if self.jitter {
            let span = (delay / 2).max(1);
            delay = delay.saturating_sub(rand::thread_rng().gen_range(0..span));
        }
        Duration::from_millis(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BackoffSchedule::Linear { base_delay_ms: 10 }, [10, 20, 30])]
    #[case(BackoffSchedule::Exponential { base_delay_ms: 10 }, [10, 20, 40])]
    #[case(BackoffSchedule::Fixed { delays_ms: vec![10_000, 20_000] }, [10_000, 20_000, 20_000])]
    fn schedules_escalate(#[case] schedule: BackoffSchedule, #[case] expected: [u64; 3]) {
        let delays: Vec<u64> = (0..3).map(|i| schedule.delay_ms(i)).collect();
        assert_eq!(delays, expected);
    }

    #[test]
    fn empty_fixed_schedule_does_not_wait() {
        let schedule = BackoffSchedule::Fixed { delays_ms: vec![] };
        assert_eq!(schedule.delay_ms(0), 0);
    }

    #[test]
    fn backoff_is_capped_and_respects_hint() {
        let cfg = ResilienceConfig::defaults()
            .with_schedule(BackoffSchedule::Linear { base_delay_ms: 100 })
            .with_max_delay_ms(1_000);
        assert_eq!(cfg.backoff(0, None), Duration::from_millis(100));
        assert_eq!(cfg.backoff(0, Some(Duration::from_millis(500))), Duration::from_millis(500));
        assert_eq!(cfg.backoff(50, None), Duration::from_millis(1_000));
        assert_eq!(cfg.backoff(0, Some(Duration::from_secs(30))), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_never_exceeds_base_delay() {
        let cfg = ResilienceConfig::defaults()
            .with_schedule(BackoffSchedule::Linear { base_delay_ms: 100 })
            .with_jitter(true);
        for _ in 0..32 {
            let delay = cfg.backoff(0, None);
            assert!(delay <= Duration::from_millis(100));
            assert!(delay >= Duration::from_millis(51));
        }
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(ResilienceConfig::defaults().with_max_attempts(0).attempts(), 1);
    }
}
