//! LLM client: a single OpenAI-compatible entry point shared by every
//! component that needs model inference — summarizer, version detector,
//! diff engine, query router, answer generator, and agent loop.
//!
//! Two model tiers are exposed: [`ModelTier::Light`] for cheap, frequent
//! calls (summaries, classification, version checks) and
//! [`ModelTier::Main`] for final answer generation and agentic reasoning.
//! Both go through the same retry/backoff and tolerant-JSON-extraction
//! machinery, per spec ("LLM calls MUST retry with exponential backoff").

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{instrument, warn};

use crate::config::Settings;
use crate::error::{Error, LlmError, Result};

/// Which model a call should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Cheap/fast model: summarization, routing, version verification.
    Light,
    /// Main model: answer generation, agent reasoning, semantic diff.
    Main,
}

/// A single chat turn, role-tagged.
#[derive(Debug, Clone)]
pub struct Message {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: &'static str,
    /// Message body.
    pub content: String,
}

impl Message {
    /// Builds a user-role message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }

    /// Builds an assistant-role message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant", content: content.into() }
    }
}

/// Provider-agnostic LLM call surface. One production implementation
/// ([`OpenAiClient`]) and test fakes satisfy this at the boundary every
/// LLM-calling component depends on.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single-turn or multi-turn completion, no streaming.
    async fn generate(
        &self,
        tier: ModelTier,
        system_prompt: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<String>;

    /// Completion streamed token-by-token.
    async fn generate_stream(
        &self,
        tier: ModelTier,
        system_prompt: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<std::pin::Pin<Box<dyn Stream<Item = Result<String>> + Send>>>;
}

/// Calls `generate`, then strict-parses the response as `T` under a JSON
/// schema, retrying the same way transient failures retry. This is the one
/// boundary spec.md requires strict schemas at ("all LLM JSON responses
/// MUST be parsed under strict schemas").
///
/// # Errors
///
/// Returns [`LlmError::SchemaValidation`] if the response is not valid JSON
/// or does not deserialize into `T`.
pub async fn generate_json<T: DeserializeOwned>(
    client: &dyn LlmClient,
    tier: ModelTier,
    system_prompt: &str,
    messages: &[Message],
    max_tokens: u32,
) -> Result<T> {
    let mut augmented = system_prompt.to_string();
    augmented.push_str(
        "\n\nRespond with a single valid JSON object only. No markdown code fences, no prose before or after.",
    );
    let raw = client.generate(tier, &augmented, messages, max_tokens).await?;
    let cleaned = strip_code_fences(&raw);
    serde_json::from_str(&cleaned)
        .map_err(|e| Error::Llm(LlmError::SchemaValidation(format!("{e}: {cleaned}"))))
}

/// Strips a single leading/trailing ```` ```json ```` or ```` ``` ```` fence,
/// if present. Unlike [`extract_balanced_json`], this assumes the content is
/// (close to) pure JSON already — used for the `generate_json` strict path.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_fence = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_fence.strip_suffix("```").unwrap_or(without_fence).trim().to_string()
}

/// Tolerant extraction of the first balanced `{...}` JSON object from
/// arbitrary LLM prose, per spec §9 ("tolerant parser for agent responses
/// ... is intentional and part of the contract, because LLMs leak prose").
/// Behavior on multiple balanced objects is first-object-wins.
#[must_use]
pub fn extract_balanced_json(text: &str) -> Option<String> {
    let cleaned = strip_code_fences(text);
    let bytes = cleaned.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(cleaned[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// `async-openai`-backed production implementation, dispatching to either
/// the light or main model name from [`Settings`] and retrying transient
/// failures with exponential backoff (reference: 3 attempts, 2-30s).
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    light_model: String,
    main_model: String,
    retry_attempts: u32,
    retry_min_backoff: Duration,
    retry_max_backoff: Duration,
}

impl OpenAiClient {
    /// Builds a client from settings, reading the API key from the `OPENAI_API_KEY`
    /// environment variable (or `llm_api_base`'s configured provider equivalent).
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let mut config = OpenAIConfig::new();
        if let Some(base) = &settings.llm_api_base {
            config = config.with_api_base(base.clone());
        }
        Self {
            client: Client::with_config(config),
            light_model: settings.light_llm_model.clone(),
            main_model: settings.llm_model.clone(),
            retry_attempts: settings.llm_retry_attempts,
            retry_min_backoff: Duration::from_secs(settings.llm_retry_min_backoff_secs),
            retry_max_backoff: Duration::from_secs(settings.llm_retry_max_backoff_secs),
        }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Light => &self.light_model,
            ModelTier::Main => &self.main_model,
        }
    }

    fn build_messages(
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if !system_prompt.is_empty() {
            out.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|e| Error::Llm(LlmError::RequestFailed { attempts: 0, reason: e.to_string() }))?
                    .into(),
            );
        }
        for m in messages {
            out.push(match m.role {
                "assistant" => async_openai::types::ChatCompletionRequestAssistantMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| Error::Llm(LlmError::RequestFailed { attempts: 0, reason: e.to_string() }))?
                    .into(),
                _ => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| Error::Llm(LlmError::RequestFailed { attempts: 0, reason: e.to_string() }))?
                    .into(),
            });
        }
        Ok(out)
    }

    async fn backoff_delay(&self, attempt: u32) -> Duration {
        let doubled = self.retry_min_backoff.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        doubled.min(self.retry_max_backoff)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    #[instrument(skip(self, messages), fields(tier = ?tier))]
    async fn generate(
        &self,
        tier: ModelTier,
        system_prompt: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<String> {
        let req_messages = Self::build_messages(system_prompt, messages)?;
        let model = self.model_for(tier).to_string();

        let mut last_err = String::new();
        for attempt in 1..=self.retry_attempts {
            let request = CreateChatCompletionRequestArgs::default()
                .model(&model)
                .messages(req_messages.clone())
                .max_tokens(max_tokens)
                .temperature(0.1)
                .build()
                .map_err(|e| Error::Llm(LlmError::RequestFailed { attempts: attempt, reason: e.to_string() }))?;

            match self.client.chat().create(request).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default();
                    return Ok(content);
                }
                Err(e) => {
                    last_err = e.to_string();
                    warn!(attempt, error = %last_err, "llm request failed, retrying");
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.backoff_delay(attempt).await).await;
                    }
                }
            }
        }
        Err(Error::Llm(LlmError::RequestFailed { attempts: self.retry_attempts, reason: last_err }))
    }

    async fn generate_stream(
        &self,
        tier: ModelTier,
        system_prompt: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<std::pin::Pin<Box<dyn Stream<Item = Result<String>> + Send>>> {
        let req_messages = Self::build_messages(system_prompt, messages)?;
        let model = self.model_for(tier).to_string();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&model)
            .messages(req_messages)
            .max_tokens(max_tokens)
            .temperature(0.1)
            .stream(true)
            .build()
            .map_err(|e| Error::Llm(LlmError::RequestFailed { attempts: 0, reason: e.to_string() }))?;

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| Error::Llm(LlmError::RequestFailed { attempts: 1, reason: e.to_string() }))?;

        let mapped = stream.map(|chunk| match chunk {
            Ok(resp) => Ok(resp
                .choices
                .first()
                .and_then(|c| c.delta.content.clone())
                .unwrap_or_default()),
            Err(e) => Err(Error::Llm(LlmError::RequestFailed { attempts: 1, reason: e.to_string() })),
        });
        Ok(Box::pin(mapped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_balanced_json_from_prose() {
        let text = "Sure thing!\n```json\n{\"a\": 1, \"b\": {\"c\": 2}}\n```\nHope that helps.";
        let json = extract_balanced_json(text).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["a"], 1);
        assert_eq!(parsed["b"]["c"], 2);
    }

    #[test]
    fn first_object_wins_on_multiple_balanced_objects() {
        let text = r#"{"first": true} some text {"second": true}"#;
        let json = extract_balanced_json(text).unwrap();
        assert!(json.contains("first"));
    }

    #[test]
    fn returns_none_without_opening_brace() {
        assert!(extract_balanced_json("no json here").is_none());
    }

    #[test]
    fn strips_json_code_fence() {
        let text = "```json\n{\"x\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"x\": 1}");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_depth_tracking() {
        let text = r#"{"note": "a { b } c", "done": true}"#;
        let json = extract_balanced_json(text).unwrap();
        assert_eq!(json, text);
    }
}
