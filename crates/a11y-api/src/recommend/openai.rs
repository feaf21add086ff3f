//! OpenAI chat-completions provider

use super::{ProviderError, RecommendationProvider};
use crate::config::AppConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are an accessibility expert.";
const MAX_TOKENS: u32 = 150;
const TEMPERATURE: f32 = 0.35;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RecommendationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response: ChatResponse = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_text()
    }
}

/// Used when no API key is configured; every request fails so the
/// resolver falls back to its generic text.
pub struct DisabledProvider;

#[async_trait]
impl RecommendationProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::MissingCredentials)
    }
}

pub fn provider_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn RecommendationProvider>, ProviderError> {
    match &config.openai_api_key {
        Some(key) => Ok(Arc::new(OpenAiProvider::new(
            key.clone(),
            config.openai_base_url.clone(),
            config.openai_model.clone(),
            Duration::from_secs(config.recommendation_timeout_secs),
        )?)),
        None => {
            tracing::warn!("OPENAI_API_KEY not set, generated recommendations disabled");
            Ok(Arc::new(DisabledProvider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn fake_completions(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer test-key");
        let content = if authorized && body["max_tokens"] == 150 {
            format!("Fix {} by adding alt text.", body["model"].as_str().unwrap_or("?"))
        } else {
            String::new()
        };
        Json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }))
    }

    async fn spawn_fake_api() -> String {
        let app = Router::new().route("/v1/chat/completions", post(fake_completions));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1/", addr)
    }

    #[test]
    fn test_response_text_extraction() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "  Use alt text. "}}]}"#).unwrap();
        assert_eq!(response.into_text().unwrap(), "Use alt text.");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(empty.into_text(), Err(ProviderError::EmptyResponse)));

        let null: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(matches!(null.into_text(), Err(ProviderError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_generate_against_local_server() {
        let base_url = spawn_fake_api().await;
        let provider =
            OpenAiProvider::new("test-key", base_url, "gpt-4o-mini", Duration::from_secs(5)).unwrap();

        let text = provider.generate("prompt").await.unwrap();
        assert_eq!(text, "Fix gpt-4o-mini by adding alt text.");
    }

    #[tokio::test]
    async fn test_wrong_key_yields_empty_response() {
        let base_url = spawn_fake_api().await;
        let provider =
            OpenAiProvider::new("other-key", base_url, "gpt-4o-mini", Duration::from_secs(5)).unwrap();

        assert!(matches!(
            provider.generate("prompt").await,
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let provider = OpenAiProvider::new(
            "test-key",
            "http://127.0.0.1:9/v1",
            "gpt-4o-mini",
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(matches!(provider.generate("prompt").await, Err(ProviderError::Http(_))));
    }

    #[tokio::test]
    async fn test_disabled_provider() {
        assert!(matches!(
            DisabledProvider.generate("prompt").await,
            Err(ProviderError::MissingCredentials)
        ));
        let config = AppConfig::default();
        assert_eq!(provider_from_config(&config).unwrap().name(), "disabled");
    }
}
