//! Checklist grading of student-written prompts through a hosted chat model.
//!
//! Prompts flow through three layers:
//!
//! - [`FingerprintCache`] deduplicates identical prompts by SHA-256 of their text;
//! - [`ResilientInvoker`] renders the grading request, calls the provider and
//!   retries with backoff while it is rate limited;
//! - [`BatchEvaluator`] fans prompts out over a bounded worker pool and returns
//!   one [`Grade`] per prompt, in input order.
//!
//! ```no_run
//! use prompt_grader::GraderBuilder;
//!
//! # async fn run() -> Result<(), prompt_grader::GradeError> {
//! let evaluator = GraderBuilder::new()
//!     .api_key(std::env::var("OPENAI_API_KEY").unwrap_or_default())
//!     .max_workers(4)
//!     .build()?;
//! let grades = evaluator
//!     .evaluate(&["너는 과학 선생님이야. 광합성을 중학생에게 설명해줘."])
//!     .await;
//! for grade in &grades {
//!     println!("{grade}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod builder;
pub mod cache;
pub mod chat;
pub mod checklist;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod grade;
pub mod parse;
pub mod resilient;
pub mod template;

pub use builder::GraderBuilder;
pub use cache::{Fingerprint, FingerprintCache};
pub use chat::{CompletionProvider, CompletionRequest};
pub use checklist::{ChecklistScores, Evaluation, CHECKLIST};
pub use error::GradeError;
pub use evaluator::{BatchEvaluator, BatchSummary};
pub use grade::{FailureKind, Grade};
pub use resilient::{BackoffSchedule, ResilienceConfig, ResilientInvoker};
