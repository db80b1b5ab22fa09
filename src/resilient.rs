#[path = "resilient/config.rs"]
mod config;

#[path = "resilient/invoker.rs"]
mod invoker;

#[path = "resilient/batch.rs"]
mod batch;

pub use config::{BackoffSchedule, ResilienceConfig};
pub use invoker::ResilientInvoker;
