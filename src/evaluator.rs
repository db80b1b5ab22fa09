#[path = "evaluator/job.rs"]
mod job;

#[path = "evaluator/dispatcher.rs"]
mod dispatcher;

#[path = "evaluator/summary.rs"]
mod summary;

pub use dispatcher::BatchEvaluator;
pub use job::Job;
pub use summary::{BatchSummary, ItemTotal};
