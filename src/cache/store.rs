use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

use crate::checklist::Evaluation;

use super::fingerprint::Fingerprint;

/// Hit/miss counters of a [`FingerprintCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    /// Lookups answered without a remote call
    pub hits: u64,
    /// Lookups that ran the computation, whether or not it succeeded
    pub misses: u64,
    /// Stored evaluations
    pub entries: usize,
}

/// Process-local cache of evaluations keyed by prompt fingerprint.
///
/// Entries are never evicted. Each fingerprint owns a once-cell, so concurrent
/// requests for the same prompt share one computation; a failed computation
/// leaves the cell empty and the next caller tries again.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    cells: Mutex<HashMap<Fingerprint, Arc<OnceCell<Evaluation>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached evaluation for `prompt`, running `compute` on a miss.
    ///
    /// `compute` must evaluate `prompt` itself. Only successful results are stored.
    pub async fn get_or_insert<F, Fut, E>(&self, prompt: &str, compute: F) -> Result<Evaluation, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Evaluation, E>>,
    {
        let fingerprint = Fingerprint::of(prompt);
        let cell = self.cell(fingerprint);

        if let Some(value) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("cache hit for {}", fingerprint.short());
            return Ok(value.clone());
        }

        let mut computed = false;
        let result = cell
            .get_or_try_init(|| {
                computed = true;
                compute()
            })
            .await;

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else if result.is_ok() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("joined in-flight evaluation for {}", fingerprint.short());
        }
        result.cloned()
    }

    /// Looks a prompt up without computing anything.
    pub fn get(&self, prompt: &str) -> Option<Evaluation> {
        let fingerprint = Fingerprint::of(prompt);
        let found = self
            .lock()
            .get(&fingerprint)
            .and_then(|cell| cell.get().cloned());
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Stores an evaluation unless one is already present or being computed.
    pub fn insert(&self, prompt: &str, evaluation: Evaluation) {
        let cell = self.cell(Fingerprint::of(prompt));
        let _ = cell.set(evaluation);
    }

    pub fn contains(&self, prompt: &str) -> bool {
        self.lock()
            .get(&Fingerprint::of(prompt))
            .is_some_and(|cell| cell.initialized())
    }

    /// Number of stored evaluations.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn cell(&self, fingerprint: Fingerprint) -> Arc<OnceCell<Evaluation>> {
        self.lock().entry(fingerprint).or_default().clone()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, Arc<OnceCell<Evaluation>>>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
