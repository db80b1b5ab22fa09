use std::collections::HashMap;

use crate::{
    checklist::Evaluation, error::GradeError, grade::Grade, parse::parse_batch,
    template::render_batch,
};

use super::invoker::ResilientInvoker;

impl ResilientInvoker {
    /// Evaluates several prompts with a single request.
    ///
    /// Always returns one grade per prompt, in order. Cached prompts are answered
    /// locally and duplicates inside the batch are sent once.
    pub async fn invoke_batch<S: AsRef<str>>(&self, prompts: &[S]) -> Vec<Grade> {
        let mut grades: Vec<Option<Grade>> = vec![None; prompts.len()];
        // unique prompt text -> slots waiting on it
        let mut pending: Vec<(&str, Vec<usize>)> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();

        for (idx, prompt) in prompts.iter().enumerate() {
            let prompt = prompt.as_ref();
            if let Some(&unique) = position.get(prompt) {
                pending[unique].1.push(idx);
                continue;
            }
            match self.cache.get(prompt) {
                Some(evaluation) => grades[idx] = Some(Grade::Scored(evaluation)),
                None => {
                    position.insert(prompt, pending.len());
                    pending.push((prompt, vec![idx]));
                }
            }
        }

        if !pending.is_empty() {
            let unique: Vec<&str> = pending.iter().map(|(prompt, _)| *prompt).collect();
            log::debug!(
                "sending batch of {} prompts ({} answered from cache)",
                unique.len(),
                prompts.len() - pending.iter().map(|(_, slots)| slots.len()).sum::<usize>()
            );
            let results = self.evaluate_batch_uncached(&unique).await;
            for ((prompt, slots), result) in pending.into_iter().zip(results) {
                match &result {
                    Ok(evaluation) => self.cache.insert(prompt, evaluation.clone()),
                    Err(GradeError::RetryExceeded { .. }) => {}
                    Err(err) => log::warn!("batch item failed: {err}"),
                }
                let grade = Grade::from(result);
                for slot in slots {
                    grades[slot] = Some(grade.clone());
                }
            }
        }

        grades
            .into_iter()
            .map(|grade| {
                grade.unwrap_or_else(|| Grade::failed(&GradeError::Generic("slot left empty".into())))
            })
            .collect()
    }

    /// One request for `prompts`; the result has exactly `prompts.len()` entries.
    async fn evaluate_batch_uncached(
        &self,
        prompts: &[&str],
    ) -> Vec<Result<Evaluation, GradeError>> {
        let request = self.request(render_batch(prompts));
        let whole_batch_error = |err: GradeError| -> Vec<_> {
            prompts
                .iter()
                .map(|_| Err(duplicate_error(&err)))
                .collect()
        };

        let raw = match self.retry(|| self.provider.complete(&request)).await {
            Ok(raw) => raw,
            Err(err) => return whole_batch_error(err),
        };
        log::trace!("{} batch answer: {raw}", self.provider.name());

        match parse_batch(&raw, prompts.len()) {
            Ok(results) => results,
            Err(err) => whole_batch_error(err),
        }
    }
}

/// Copies an error that applies to every slot of a failed batch.
fn duplicate_error(err: &GradeError) -> GradeError {
    match err {
        GradeError::RetryExceeded {
            attempts,
            last_error,
        } => GradeError::RetryExceeded {
            attempts: *attempts,
            last_error: last_error.clone(),
        },
        GradeError::ResponseFormatError {
            message,
            raw_response,
        } => GradeError::malformed(message.clone(), raw_response.clone()),
        GradeError::JsonError(message) => GradeError::JsonError(message.clone()),
        GradeError::RateLimited { retry_after } => GradeError::RateLimited {
            retry_after: *retry_after,
        },
        GradeError::Cancelled => GradeError::Cancelled,
        other => GradeError::ProviderError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{Map, Value};

    use super::*;
    use crate::cache::FingerprintCache;
    use crate::chat::{CompletionProvider, CompletionRequest};
    use crate::checklist::{ChecklistScores, CHECKLIST, FEEDBACK_KEY};
    use crate::grade::FailureKind;
    use crate::resilient::{BackoffSchedule, ResilienceConfig};

    /// Answers a batch by echoing one record per `[n]` marker, skipping `drop`.
    struct EchoBatch {
        drop: Option<usize>,
        calls: AtomicUsize,
        last_user: Mutex<String>,
        rate_limited: bool,
    }

    impl EchoBatch {
        fn new(drop: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                drop,
                calls: AtomicUsize::new(0),
                last_user: Mutex::new(String::new()),
                rate_limited: false,
            })
        }
    }

    fn record(id: usize) -> Value {
        let mut object = Map::new();
        object.insert("id".into(), id.into());
        for item in CHECKLIST.iter() {
            object.insert(item.name.into(), 1.into());
        }
        object.insert(FEEDBACK_KEY.into(), format!("item {id}").into());
        Value::Object(object)
    }

    #[async_trait]
    impl CompletionProvider for EchoBatch {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, GradeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user.lock().unwrap() = request.user.clone();
            if self.rate_limited {
                return Err(GradeError::RateLimited { retry_after: None });
            }
            let count = (1..).take_while(|n| request.user.contains(&format!("[{n}]\n"))).count();
            let records: Vec<Value> = (1..=count)
                .filter(|id| Some(*id) != self.drop)
                .map(record)
                .collect();
            Ok(Value::Array(records).to_string())
        }
    }

    fn invoker(provider: Arc<EchoBatch>, cache: Arc<FingerprintCache>) -> ResilientInvoker {
        let cfg = ResilienceConfig::defaults()
            .with_max_attempts(2)
            .with_schedule(BackoffSchedule::Linear { base_delay_ms: 1 });
        ResilientInvoker::new(provider, cache, cfg)
    }

    #[tokio::test]
    async fn batch_results_follow_prompt_order() {
        let provider = EchoBatch::new(None);
        let invoker = invoker(provider.clone(), Arc::new(FingerprintCache::new()));

        let grades = invoker.invoke_batch(&["a", "b", "c"]).await;

        let feedback: Vec<_> = grades
            .iter()
            .map(|g| g.evaluation().unwrap().feedback.clone())
            .collect();
        assert_eq!(feedback, ["item 1", "item 2", "item 3"]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn truncated_batch_marks_only_missing_slot() {
        let provider = EchoBatch::new(Some(2));
        let invoker = invoker(provider, Arc::new(FingerprintCache::new()));

        let grades = invoker.invoke_batch(&["a", "b", "c"]).await;

        assert_eq!(grades.len(), 3);
        assert!(grades[0].is_scored());
        assert!(matches!(
            grades[1],
            Grade::Failed {
                kind: FailureKind::MalformedResponse,
                ..
            }
        ));
        assert_eq!(grades[2].evaluation().unwrap().feedback, "item 3");
    }

    #[tokio::test]
    async fn cached_and_duplicate_prompts_are_not_resent() {
        let cache = Arc::new(FingerprintCache::new());
        cache.insert("known", Evaluation::new(ChecklistScores::default(), "cached"));
        let provider = EchoBatch::new(None);
        let invoker = invoker(provider.clone(), cache.clone());

        let grades = invoker.invoke_batch(&["known", "new", "new"]).await;

        assert_eq!(grades[0].evaluation().unwrap().feedback, "cached");
        assert_eq!(grades[1], grades[2]);
        let sent = provider.last_user.lock().unwrap().clone();
        assert!(sent.contains("[1]\nnew"));
        assert!(!sent.contains("[2]\n"));
        assert!(!sent.contains("known"));
        assert!(cache.contains("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_batch_yields_sentinels() {
        let provider = Arc::new(EchoBatch {
            drop: None,
            calls: AtomicUsize::new(0),
            last_user: Mutex::new(String::new()),
            rate_limited: true,
        });
        let invoker = invoker(provider.clone(), Arc::new(FingerprintCache::new()));

        let grades = invoker.invoke_batch(&["a", "b"]).await;

        assert_eq!(grades, vec![Grade::Throttled { attempts: 2 }; 2]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
