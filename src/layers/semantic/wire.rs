//! Wire types for the OpenAI-compatible chat-completions contract (§6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub temperature: f64,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self { kind: "json_object" }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    pub content: String,
}

/// The `{is_threat, confidence, threat_type, indicators[], explanation}`
/// shape the assistant message content must parse as.
#[derive(Debug, Clone, Deserialize)]
pub struct SemanticVerdict {
    pub is_threat: bool,
    pub confidence: f64,
    pub threat_type: Option<String>,
    #[serde(default)]
    pub indicators: Vec<String>,
    pub explanation: String,
}

/// Build the request URL, mirroring the OpenAI-compatible and Azure
/// OpenAI shapes (§6): `{endpoint}[/openai/deployments/{deployment}]/chat/completions[?api-version=…]`.
#[must_use]
pub fn build_url(endpoint: &str, deployment: Option<&str>, api_version: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    match deployment {
        Some(deployment) => {
            format!("{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={api_version}")
        }
        None => format!("{endpoint}/chat/completions"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_azure_style_url_with_deployment() {
        let url = build_url("https://example.openai.azure.com", Some("gpt-4o"), "2024-08-01-preview");
        assert_eq!(
            url,
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-08-01-preview"
        );
    }

    #[test]
    fn builds_plain_openai_style_url_without_deployment() {
        let url = build_url("https://api.openai.com/v1", None, "2024-08-01-preview");
        assert_eq!(url, "https://api.openai.com/v1/chat/completions");
    }
}
