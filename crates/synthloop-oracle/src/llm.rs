//! HTTP-backed generative oracle.
//!
//! Speaks either the Anthropic Messages API or an OpenAI-compatible chat
//! completions endpoint. Every response is cleaned with
//! [`extract_code_block`] except diagnoses, which are free text.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use synthloop_core::{ExecutionResult, GenerationError, Oracle, Specification};
use tracing::{debug, instrument};

use crate::config::{Backend, OracleConfig, OracleConfigError};
use crate::extract::extract_code_block;
use crate::prompt::PromptProfile;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

/// Oracle backed by a hosted language model.
#[derive(Debug, Clone)]
pub struct LlmOracle {
    client: Client,
    config: OracleConfig,
    profile: PromptProfile,
}

impl LlmOracle {
    pub fn new(config: OracleConfig, profile: PromptProfile) -> Result<Self, OracleConfigError> {
        config.validate()?;
        let mut builder = Client::builder().timeout(config.request_timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| OracleConfigError::Client(e.to_string()))?;
        Ok(Self {
            client,
            config,
            profile,
        })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn profile(&self) -> PromptProfile {
        self.profile
    }

    /// One system + user exchange, returning the raw reply text.
    #[instrument(skip_all, fields(backend = %self.config.backend, model = %self.config.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let started = Instant::now();
        let text = match self.config.backend {
            Backend::Anthropic => self.complete_anthropic(system, user).await?,
            Backend::OpenAi => self.complete_openai(system, user).await?,
        };
        debug!(
            reply_bytes = text.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "oracle reply received"
        );
        if text.trim().is_empty() {
            return Err(GenerationError::InvalidResponse("empty reply".into()));
        }
        Ok(text)
    }

    async fn complete_anthropic(
        &self,
        system: &str,
        user: &str,
    ) -> Result<String, GenerationError> {
        let payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": system,
            "messages": [
                {
                    "role": "user",
                    "content": user,
                }
            ],
        });

        let response = self
            .client
            .post(self.config.url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenerationError::Request(format!("anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("anthropic", status, &body));
        }

        let body: AnthropicResponse = response.json().await.map_err(|e| {
            GenerationError::InvalidResponse(format!("invalid anthropic response: {e}"))
        })?;

        Ok(body
            .content
            .iter()
            .filter(|part| part.content_type == "text")
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn complete_openai(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .client
            .post(self.config.url())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenerationError::Request(format!("openai request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("openai", status, &body));
        }

        let body: OpenAiResponse = response.json().await.map_err(|e| {
            GenerationError::InvalidResponse(format!("invalid openai response: {e}"))
        })?;

        let choice = body.choices.first().ok_or_else(|| {
            GenerationError::InvalidResponse("openai response did not include choices".into())
        })?;
        Ok(extract_text(&choice.message.content))
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn produce_test(&self, specification: &Specification) -> Result<String, GenerationError> {
        let reply = self
            .complete(
                self.profile.test_system(),
                &self.profile.test_request(specification),
            )
            .await?;
        non_empty_code(&reply)
    }

    async fn produce_implementation(
        &self,
        specification: &Specification,
        test_text: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let reply = self
            .complete(
                self.profile.implementation_system(),
                &self
                    .profile
                    .implementation_request(specification, test_text, context),
            )
            .await?;
        non_empty_code(&reply)
    }

    async fn produce_diagnosis(&self, result: &ExecutionResult) -> Result<String, GenerationError> {
        let reply = self
            .complete(
                self.profile.diagnosis_system(),
                &self.profile.diagnosis_request(result),
            )
            .await?;
        Ok(reply.trim().to_string())
    }
}

fn non_empty_code(reply: &str) -> Result<String, GenerationError> {
    let code = extract_code_block(reply);
    if code.is_empty() {
        return Err(GenerationError::InvalidResponse(
            "reply contained no code".into(),
        ));
    }
    Ok(code)
}

/// Map a non-success HTTP status to a generation error.
fn status_error(backend: &str, status: StatusCode, body: &str) -> GenerationError {
    let message = format!("{backend} error {status}: {}", truncate(body, 320));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => GenerationError::Quota(message),
        _ => GenerationError::Request(message),
    }
}

fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error("anthropic", StatusCode::UNAUTHORIZED, "bad key"),
            GenerationError::Auth(_)
        ));
        assert!(matches!(
            status_error("openai", StatusCode::TOO_MANY_REQUESTS, "slow down"),
            GenerationError::Quota(_)
        ));
        assert!(matches!(
            status_error("openai", StatusCode::BAD_GATEWAY, ""),
            GenerationError::Request(_)
        ));
    }

    #[test]
    fn openai_content_parts_are_joined() {
        let content = json!([{ "type": "text", "text": "a" }, { "type": "text", "text": "b" }]);
        assert_eq!(extract_text(&content), "a\nb");
        assert_eq!(extract_text(&json!("plain")), "plain");
        assert_eq!(extract_text(&Value::Null), "");
    }

    #[test]
    fn truncate_marks_cut_bodies() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn fenceless_empty_reply_is_invalid() {
        assert!(matches!(
            non_empty_code("```python\n```"),
            Err(GenerationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn construction_validates_config() {
        let config = OracleConfig::new(Backend::Anthropic, "k").with_max_tokens(0);
        assert!(LlmOracle::new(config, PromptProfile::General).is_err());
    }
}
