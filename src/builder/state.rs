use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use crate::{cache::FingerprintCache, chat::CompletionProvider, resilient::ResilienceConfig};

#[derive(Default)]
pub(crate) struct BuilderState {
    pub(crate) provider: Option<Arc<dyn CompletionProvider>>,
    pub(crate) api_key: Option<SecretString>,
    pub(crate) base_url: Option<String>,
    pub(crate) model: Option<String>,
    pub(crate) temperature: Option<f32>,
    pub(crate) timeout_seconds: Option<u64>,
    pub(crate) retry: ResilienceConfig,
    pub(crate) max_workers: Option<usize>,
    pub(crate) batch_size: Option<usize>,
    pub(crate) inter_batch_wait: Option<Duration>,
    pub(crate) cache: Option<Arc<FingerprintCache>>,
    pub(crate) cancel: Option<CancellationToken>,
}
