use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use synod_core::{LlmConfig, SynodError};

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use synod_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Review this code".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// The seam between the orchestrator and a chat-completion provider.
///
/// One review issues several independent `chat` calls concurrently; an
/// implementation must therefore be usable through a shared reference.
/// Tests substitute scripted backends to exercise degradation paths.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one stateless chat exchange and return the assistant text.
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, SynodError>;

    /// Identifier of the model serving the requests.
    fn model(&self) -> &str;
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes the `/v1/chat/completions`
/// endpoint; provider selection only changes the base URL and API key.
///
/// # Examples
///
/// ```
/// use synod_core::LlmConfig;
/// use synod_review::llm::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SynodError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, SynodError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| SynodError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    /// Send a chat completion request and return the text response.
    ///
    /// Builds a request to `{base_url}/v1/chat/completions` with the given
    /// messages, temperature 0.1, and JSON response format. Failures are
    /// classified into [`SynodError::Llm`]; callers isolate them per task.
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, SynodError> {
        let url = format!("{}/v1/chat/completions", self.config.resolved_base_url());

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0.1,
            "response_format": { "type": "json_object" },
        });

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }
        request = request.header("Content-Type", "application/json");

        let response = request.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                SynodError::Llm("provider request timed out".into())
            } else {
                SynodError::Llm(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(SynodError::Llm(format!(
                "provider API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SynodError::Llm(format!("failed to parse response: {e}")))?;

        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                SynodError::Llm(format!("unexpected response structure: {response_body}"))
            })?;

        Ok(content.to_string())
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn client_construction_succeeds() {
        let config = LlmConfig::default();
        assert!(LlmClient::new(&config).is_ok());
    }

    #[test]
    fn model_returns_config_model() {
        let config = LlmConfig {
            model: "gpt-4o".into(),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        assert_eq!(client.model(), "gpt-4o");
    }

    #[test]
    fn chat_message_serializes() {
        let msg = ChatMessage {
            role: Role::System,
            content: "hello".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hello");
    }

    #[tokio::test]
    async fn chat_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "{\"findings\": []}" } }
                ]
            })))
            .mount(&server)
            .await;

        let config = LlmConfig {
            api_key: Some("test-key".into()),
            base_url: Some(server.uri()),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        let response = client
            .chat(vec![ChatMessage {
                role: Role::User,
                content: "hi".into(),
            }])
            .await
            .unwrap();
        assert_eq!(response, "{\"findings\": []}");
    }

    #[tokio::test]
    async fn chat_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let config = LlmConfig {
            base_url: Some(server.uri()),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        let err = client.chat(vec![]).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("429"), "got: {msg}");
        assert!(msg.contains("slow down"), "got: {msg}");
    }

    #[tokio::test]
    async fn chat_rejects_malformed_response_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let config = LlmConfig {
            base_url: Some(server.uri()),
            ..LlmConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        let err = client.chat(vec![]).await.unwrap_err();
        assert!(err.to_string().contains("unexpected response structure"));
    }
}
