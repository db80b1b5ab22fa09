//! Per-row outcome of a batch run.

use std::fmt;

use serde::Serialize;

use crate::checklist::Evaluation;
use crate::error::GradeError;

/// Why a row has no evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The model answered but the answer did not parse
    MalformedResponse,
    /// The provider call failed for a reason other than throttling
    Provider,
    /// The batch was cancelled before this row was submitted
    Cancelled,
    /// The worker running this row stopped unexpectedly
    Internal,
}

impl FailureKind {
    pub fn classify(err: &GradeError) -> Self {
        match err {
            GradeError::ResponseFormatError { .. } | GradeError::JsonError(_) => {
                FailureKind::MalformedResponse
            }
            GradeError::Cancelled => FailureKind::Cancelled,
            GradeError::Generic(_) => FailureKind::Internal,
            _ => FailureKind::Provider,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MalformedResponse => "malformed response",
            FailureKind::Provider => "provider error",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal error",
        }
    }
}

/// Result slot for one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Grade {
    /// The model produced a valid evaluation
    Scored(Evaluation),
    /// Rate limiting persisted through every attempt
    Throttled { attempts: usize },
    /// The row failed permanently
    Failed { kind: FailureKind, message: String },
}

impl Grade {
    pub fn failed(err: &GradeError) -> Self {
        Grade::Failed {
            kind: FailureKind::classify(err),
            message: err.to_string(),
        }
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        match self {
            Grade::Scored(evaluation) => Some(evaluation),
            _ => None,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, Grade::Scored(_))
    }

    /// Error marker placed in the output table for rows without an evaluation.
    pub fn marker(&self) -> Option<String> {
        match self {
            Grade::Scored(_) => None,
            Grade::Throttled { attempts } => {
                Some(format!("[error] rate limited after {attempts} attempts"))
            }
            Grade::Failed { kind, message } => Some(format!("[error] {}: {message}", kind.as_str())),
        }
    }
}

/// Exhausted retries become [`Grade::Throttled`]; other errors become [`Grade::Failed`].
impl From<Result<Evaluation, GradeError>> for Grade {
    fn from(result: Result<Evaluation, GradeError>) -> Self {
        match result {
            Ok(evaluation) => Grade::Scored(evaluation),
            Err(GradeError::RetryExceeded { attempts, .. }) => Grade::Throttled { attempts },
            Err(err) => Grade::failed(&err),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Scored(evaluation) => write!(f, "{evaluation}"),
            _ => f.write_str(&self.marker().unwrap_or_default()),
        }
    }
}
