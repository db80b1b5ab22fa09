use async_trait::async_trait;

use crate::error::GradeError;

use super::message::ChatMessage;

/// One system + user exchange sent to a chat-completion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Role-setting instruction
    pub system: String,
    /// Rendered user message
    pub user: String,
    /// Model identifier understood by the provider
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: model.into(),
            temperature,
        }
    }

    /// The request as an ordered message list.
    pub fn messages(&self) -> [ChatMessage; 2] {
        [
            ChatMessage::system().content(self.system.as_str()).build(),
            ChatMessage::user().content(self.user.as_str()).build(),
        ]
    }
}

/// Capability interface for a hosted chat model.
///
/// Implementations must report throttling as [`GradeError::RateLimited`] so the
/// invoker can back off; every other error is treated as non-retryable.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GradeError>;

    /// Short name used in log lines.
    fn name(&self) -> &str {
        "provider"
    }
}
