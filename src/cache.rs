//! Content-addressed cache of evaluations.

#[path = "cache/fingerprint.rs"]
mod fingerprint;

#[path = "cache/store.rs"]
mod store;

pub use fingerprint::Fingerprint;
pub use store::{CacheStats, FingerprintCache};
