//! Chat-completions client
//!
//! Speaks the OpenAI-compatible `/chat/completions` API. Transient failures
//! (timeouts, 5xx, 429) are retried with exponential backoff; structured calls
//! strip Markdown fences before parsing JSON.

use crate::config::LlmSettings;
use crate::text::strip_code_fences;
use crate::types::{CollaboratorError, CollaboratorResult};
use crate::utils::{retry_transient, BackoffPolicy};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// LLM client shared by the analyzer, generator and fact checker
pub struct LlmClient {
    http_client: reqwest::Client,
    settings: LlmSettings,
    api_key: Option<String>,
    policy: BackoffPolicy,
}

impl LlmClient {
    /// Build from settings; the API key is read from `settings.api_key_env`
    pub fn new(settings: LlmSettings) -> CollaboratorResult<Self> {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|key| !key.is_empty());
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(settings: LlmSettings, api_key: Option<String>) -> CollaboratorResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("HTTP client: {}", e)))?;
        let policy = BackoffPolicy::new(settings.max_attempts, settings.max_backoff_secs);

        Ok(Self {
            http_client,
            settings,
            api_key,
            policy,
        })
    }

    pub fn default_temperature(&self) -> f32 {
        self.settings.temperature
    }

    /// Plain-text completion
    pub async fn complete(&self, system: &str, prompt: &str, temperature: f32) -> CollaboratorResult<String> {
        retry_transient("llm_completion", self.policy, || self.send(system, prompt, temperature)).await
    }

    /// Completion parsed as JSON into `T`
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> CollaboratorResult<T> {
        let text = self.complete(system, prompt, temperature).await?;
        parse_json_response(&text)
    }

    async fn send(&self, system: &str, prompt: &str, temperature: f32) -> CollaboratorResult<String> {
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature,
        };

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(CollaboratorError::RateLimited(response.text().await.unwrap_or_default()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http {
                status: Some(status.as_u16()),
                message,
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CollaboratorError::InvalidResponse("completion has no content".to_string()))?;

        debug!(model = %self.settings.model, chars = content.len(), "Completion received");
        Ok(content)
    }
}

/// Parse a model reply as JSON.
///
/// Accepts fenced replies and replies with prose around a single JSON object.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> CollaboratorResult<T> {
    let unfenced = strip_code_fences(text);
    match serde_json::from_str(&unfenced) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) else {
                return Err(CollaboratorError::InvalidResponse(format!(
                    "reply is not JSON: {}",
                    first_error
                )));
            };
            if end < start {
                return Err(CollaboratorError::InvalidResponse(format!(
                    "reply is not JSON: {}",
                    first_error
                )));
            }
            serde_json::from_str(&unfenced[start..=end])
                .map_err(|e| CollaboratorError::InvalidResponse(format!("reply is not JSON: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Topic {
        main_topic: String,
    }

    #[test]
    fn test_parse_fenced_json() {
        let reply = "```json\n{\"main_topic\": \"DMARC\"}\n```";
        let topic: Topic = parse_json_response(reply).unwrap();
        assert_eq!(topic.main_topic, "DMARC");
    }

    #[test]
    fn test_parse_json_surrounded_by_prose() {
        let reply = "Here is the analysis:\n{\"main_topic\": \"SPF\"}\nLet me know!";
        let topic: Topic = parse_json_response(reply).unwrap();
        assert_eq!(topic.main_topic, "SPF");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_json_response::<Topic>("I cannot help with that").unwrap_err();
        assert!(matches!(err, CollaboratorError::InvalidResponse(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_chat_request_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: 0.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
