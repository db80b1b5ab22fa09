//! OpenAI chat completions client.
//!
//! Sends one system and one user message per call and returns the text of the
//! first choice. Throttling answers are surfaced as [`GradeError::RateLimited`]
//! so the invoker can back off.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{
    chat::{ChatMessage, CompletionProvider, CompletionRequest},
    error::GradeError,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Configuration for the OpenAI client.
#[derive(Debug)]
pub struct OpenAIConfig {
    /// API key for authentication with OpenAI.
    pub api_key: SecretString,
    /// Base URL; `chat/completions` is joined onto it.
    pub base_url: Url,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

/// Client for OpenAI's chat completions endpoint.
///
/// The client uses `Arc` internally for configuration, making cloning cheap.
#[derive(Debug, Clone)]
pub struct OpenAI {
    pub config: Arc<OpenAIConfig>,
    pub client: Client,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChatChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAIChatChoice {
    message: OpenAIChatMsg,
}

#[derive(Deserialize, Debug)]
struct OpenAIChatMsg {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAI {
    /// Creates a client. An empty key is rejected up front.
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, GradeError> {
        let mut builder = Client::builder();
        if let Some(sec) = timeout_seconds {
            builder = builder.timeout(Duration::from_secs(sec));
        }
        let client = builder
            .build()
            .map_err(|e| GradeError::HttpError(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(client, api_key, base_url, timeout_seconds)
    }

    fn with_client(
        client: Client,
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, GradeError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GradeError::AuthError("Missing OpenAI API key".to_string()));
        }
        Ok(Self {
            config: Arc::new(OpenAIConfig {
                api_key: SecretString::new(api_key),
                base_url: parse_base_url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?,
                timeout_seconds,
            }),
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    pub fn timeout_seconds(&self) -> Option<u64> {
        self.config.timeout_seconds
    }

    fn completions_url(&self) -> Result<Url, GradeError> {
        self.config
            .base_url
            .join("chat/completions")
            .map_err(|e| GradeError::HttpError(e.to_string()))
    }

    fn apply_timeout(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.timeout_seconds {
            Some(timeout) => request.timeout(Duration::from_secs(timeout)),
            None => request,
        }
    }

    fn log_request_payload<T: Serialize>(&self, body: &T) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        if let Ok(json) = serde_json::to_string(body) {
            log::trace!("OpenAI request payload: {json}");
        }
    }

    /// Maps non-success statuses onto the error taxonomy.
    async fn ensure_success_response(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GradeError> {
        let status = response.status();
        log::debug!("OpenAI HTTP status: {status}");
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GradeError::RateLimited {
                retry_after: retry_after(&response),
            });
        }
        let error_text = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GradeError::AuthError(
                format!("OpenAI rejected credentials ({status}): {error_text}"),
            )),
            _ => Err(GradeError::ProviderError(format!(
                "OpenAI returned error status {status}: {error_text}"
            ))),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, GradeError> {
    // `Url::join` drops the last segment unless the path ends with a slash
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|e| GradeError::InvalidRequest(format!("invalid base URL {raw}: {e}")))
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl CompletionProvider for OpenAI {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GradeError> {
        let messages = request.messages();
        let body = OpenAIChatRequest {
            model: &request.model,
            messages: &messages,
            temperature: request.temperature,
            stream: false,
        };
        self.log_request_payload(&body);

        let http_request = self
            .client
            .post(self.completions_url()?)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body);
        let response = self.apply_timeout(http_request).send().await?;
        let response = self.ensure_success_response(response).await?;

        let resp_text = response.text().await?;
        let decoded: OpenAIChatResponse =
            serde_json::from_str(&resp_text).map_err(|e| GradeError::ResponseFormatError {
                message: format!("Failed to decode OpenAI response: {e}"),
                raw_response: resp_text.clone(),
            })?;

        decoded
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GradeError::malformed("OpenAI response has no message content", resp_text))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest::new("system text", "user text", "gpt-4o", 0.0)
    }

    fn client(server: &mockito::ServerGuard) -> OpenAI {
        OpenAI::new("test-key", Some(format!("{}/v1", server.url())), Some(5)).unwrap()
    }

    #[test]
    fn empty_key_is_an_auth_error() {
        let err = OpenAI::new("  ", None, None).unwrap_err();
        assert!(matches!(err, GradeError::AuthError(_)));
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_its_path() {
        let openai = OpenAI::new("k", Some("http://localhost:1234/v1".into()), None).unwrap();
        assert_eq!(
            openai.completions_url().unwrap().as_str(),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o",
                "temperature": 0.0,
                "messages": [
                    {"role": "system", "content": "system text"},
                    {"role": "user", "content": "user text"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"choices": [{"message": {"content": "answer"}}]}).to_string())
            .create_async()
            .await;

        let text = client(&server).complete(&request()).await.unwrap();

        assert_eq!(text, "answer");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited_with_hint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_header("retry-after", "7")
            .with_body("slow down")
            .create_async()
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn unauthorized_is_an_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .create_async()
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();

        assert!(matches!(err, GradeError::AuthError(_)));
    }

    #[tokio::test]
    async fn server_error_is_a_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();

        assert!(matches!(err, GradeError::ProviderError(ref msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();

        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn missing_choices_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();

        assert!(err.is_malformed());
    }
}
