//! HTTP transport for the Semantic Analysis Layer.

use super::wire::{build_url, ChatCompletionRequest, ChatMessage, ResponseFormat, SemanticVerdict};
use super::retry::FailureKind;
use async_trait::async_trait;
use std::time::Duration;

/// A transport failure, classified so the retry loop knows whether to
/// try again.
#[derive(Debug, Clone)]
pub struct ClientError {
    pub message: String,
    pub kind: FailureKind,
}

/// A source of semantic (LLM-backed) threat assessments. Implementations
/// own their HTTP client / credentials for the process lifetime.
#[async_trait]
pub trait SemanticClient: Send + Sync {
    /// Send one chat-completion request and parse the assistant's JSON
    /// response into a [`SemanticVerdict`].
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        timeout: Duration,
    ) -> Result<SemanticVerdict, ClientError>;
}

#[cfg(feature = "semantic")]
mod reqwest_backend {
    use super::{build_url, ChatCompletionRequest, ChatMessage, ClientError, FailureKind, ResponseFormat, SemanticClient, SemanticVerdict};
    use crate::layers::semantic::retry::classify_status;
    use crate::layers::semantic::wire::ChatCompletionResponse;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Credentials and endpoint shape for an OpenAI-compatible or Azure
    /// OpenAI chat-completions endpoint.
    pub struct ReqwestSemanticClient {
        http: reqwest::Client,
        endpoint: String,
        deployment: Option<String>,
        api_key: String,
        api_version: String,
        model: Option<String>,
    }

    impl ReqwestSemanticClient {
        #[must_use]
        pub fn new(endpoint: String, deployment: Option<String>, api_key: String, api_version: String, model: Option<String>) -> Self {
            Self {
                http: reqwest::Client::new(),
                endpoint,
                deployment,
                api_key,
                api_version,
                model,
            }
        }

        fn auth_header(&self) -> (&'static str, String) {
            if self.deployment.is_some() {
                ("api-key", self.api_key.clone())
            } else {
                ("Authorization", format!("Bearer {}", self.api_key))
            }
        }
    }

    #[async_trait]
    impl SemanticClient for ReqwestSemanticClient {
        async fn complete(
            &self,
            system_prompt: &str,
            user_prompt: &str,
            timeout: Duration,
        ) -> Result<SemanticVerdict, ClientError> {
            let url = build_url(&self.endpoint, self.deployment.as_deref(), &self.api_version);
            let body = ChatCompletionRequest {
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: system_prompt.to_string(),
                    },
                    ChatMessage {
                        role: "user",
                        content: user_prompt.to_string(),
                    },
                ],
                model: self.model.clone(),
                temperature: 0.0,
                response_format: ResponseFormat::default(),
            };

            let (header_name, header_value) = self.auth_header();
            let response = self
                .http
                .post(&url)
                .header(header_name, header_value)
                .json(&body)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| ClientError {
                    kind: if e.is_timeout() {
                        FailureKind::Transient
                    } else {
                        FailureKind::Transient // network errors are transient
                    },
                    message: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(ClientError {
                    kind: classify_status(status.as_u16()),
                    message: format!("semantic endpoint returned {status}"),
                });
            }

            let parsed: ChatCompletionResponse = response.json().await.map_err(|e| ClientError {
                kind: FailureKind::Permanent,
                message: format!("failed to parse chat-completions envelope: {e}"),
            })?;

            let content = parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| ClientError {
                    kind: FailureKind::Permanent,
                    message: "response contained no choices".to_string(),
                })?;

            serde_json::from_str::<SemanticVerdict>(&content).map_err(|e| ClientError {
                kind: FailureKind::Permanent,
                message: format!("assistant content was not the expected JSON shape: {e}"),
            })
        }
    }
}

#[cfg(feature = "semantic")]
pub use reqwest_backend::ReqwestSemanticClient;

/// Stand-in used when the `semantic` feature isn't compiled in but a
/// caller still enables `SemanticAnalysis` in configuration. Always
/// fails permanently, so the layer surfaces a clear error marker rather
/// than silently doing nothing.
pub struct UnconfiguredClient;

#[async_trait]
impl SemanticClient for UnconfiguredClient {
    async fn complete(&self, _: &str, _: &str, _: Duration) -> Result<SemanticVerdict, ClientError> {
        Err(ClientError {
            kind: FailureKind::Permanent,
            message: "semantic analysis layer enabled but the `semantic` feature was not compiled in".to_string(),
        })
    }
}
