use std::{env, fmt};

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Client;
use serde::Deserialize;

const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const POE_ENDPOINT: &str = "https://api.poe.com/v1/chat/completions";

/// Enumerates the supported completion backends.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LlmProvider {
    OpenRouter,
    Poe,
}

impl LlmProvider {
    fn endpoint(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => OPENROUTER_ENDPOINT,
            LlmProvider::Poe => POE_ENDPOINT,
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenRouter => write!(f, "openrouter"),
            LlmProvider::Poe => write!(f, "poe"),
        }
    }
}

/// Chat-style completion request. `model` carries the provider prefix,
/// e.g. `openrouter/openai/gpt-4o-mini`.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub json_response: bool,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            json_response: false,
        }
    }

    /// Ask the provider for a JSON object response where it supports it.
    pub fn expect_json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub response_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub token_usage: TokenUsage,
    pub provider: LlmProvider,
    pub model: String,
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
}

#[derive(Clone, Default)]
struct LlmConfig {
    openrouter_api_key: Option<String>,
    poe_api_key: Option<String>,
    openrouter_referer: Option<String>,
    openrouter_title: Option<String>,
}

impl LlmClient {
    /// Build a client using environment variables.
    pub fn from_env() -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            config: LlmConfig {
                openrouter_api_key: env::var("OPENROUTER_API_KEY").ok(),
                poe_api_key: env::var("POE_API_KEY").ok(),
                openrouter_referer: env::var("OPENROUTER_HTTP_REFERER").ok(),
                openrouter_title: env::var("OPENROUTER_X_TITLE").ok(),
            },
        })
    }

    /// Execute a request against the provider encoded in the model name.
    pub async fn execute(&self, request: LlmRequest) -> Result<LlmResponse> {
        let (provider, model) = parse_model_provider(&request.model)?;

        let api_key = match provider {
            LlmProvider::OpenRouter => self.config.openrouter_api_key.as_deref(),
            LlmProvider::Poe => self.config.poe_api_key.as_deref(),
        }
        .ok_or_else(|| anyhow!("no API key configured for provider {provider}"))?;

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role.as_str(),
                    "content": msg.text,
                })
            })
            .collect();

        let mut payload = serde_json::json!({
            "model": model,
            "messages": messages,
        });
        // Poe ignores response_format, so it is only sent to OpenRouter.
        if request.json_response && provider == LlmProvider::OpenRouter {
            payload["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let mut req_builder = self
            .http
            .post(provider.endpoint())
            .bearer_auth(api_key)
            .json(&payload);

        if provider == LlmProvider::OpenRouter {
            if let Some(referer) = &self.config.openrouter_referer {
                req_builder = req_builder.header("HTTP-Referer", referer);
            }
            if let Some(title) = &self.config.openrouter_title {
                req_builder = req_builder.header("X-Title", title);
            }
        }

        let response = req_builder
            .send()
            .await
            .with_context(|| format!("{provider} request failed"))?;
        let status = response.status();
        let response_text = response.text().await.context("failed to read response body")?;
        let body: serde_json::Value = serde_json::from_str(&response_text).with_context(|| {
            format!(
                "failed to parse {provider} response as JSON. Response body: {}",
                preview(&response_text)
            )
        })?;
        if !status.is_success() {
            bail!("{provider} call failed with status {status}: {body}");
        }

        let (text, usage) = extract_text_and_usage(&body)
            .ok_or_else(|| anyhow!("unexpected {provider} response payload: {body}"))?;

        let prompt_tokens = approximate_token_count(
            &request
                .messages
                .iter()
                .map(|m| m.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        );
        let mut token_usage = usage.unwrap_or_default();
        if token_usage.prompt_tokens == 0 {
            token_usage.prompt_tokens = prompt_tokens;
        }
        if token_usage.response_tokens == 0 {
            token_usage.response_tokens = approximate_token_count(&text);
        }
        token_usage.total_tokens = token_usage.prompt_tokens + token_usage.response_tokens;

        Ok(LlmResponse {
            text,
            token_usage,
            provider,
            model: model.to_string(),
        })
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > 500 {
        format!("{}...", text.chars().take(500).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Extract assistant text and optional usage metrics from a Chat Completions payload.
fn extract_text_and_usage(value: &serde_json::Value) -> Option<(String, Option<TokenUsage>)> {
    let chat = serde_json::from_value::<ChatCompletionPayload>(value.clone()).ok()?;
    if chat.choices.is_empty() {
        return None;
    }

    let text = chat
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .unwrap_or_default();

    let usage = chat.usage.map(|usage| TokenUsage {
        prompt_tokens: usage.prompt_tokens.unwrap_or_default(),
        response_tokens: usage.completion_tokens.unwrap_or_default(),
        total_tokens: usage.total_tokens.unwrap_or_default(),
    });

    Some((text, usage))
}

/// Whether `model` carries a provider prefix this client can route.
pub fn is_supported_model(model: &str) -> bool {
    parse_model_provider(model).is_ok()
}

fn parse_model_provider(model: &str) -> Result<(LlmProvider, &str)> {
    let (provider, name) = model.split_once('/').ok_or_else(|| {
        anyhow!("model must be prefixed with provider, e.g. 'openrouter/openai/gpt-4o-mini'")
    })?;

    if name.trim().is_empty() {
        bail!("model name is required after provider prefix");
    }

    match provider {
        "openrouter" => Ok((LlmProvider::OpenRouter, name)),
        "poe" => Ok((LlmProvider::Poe, name)),
        other => bail!("unsupported provider prefix: {other}"),
    }
}

fn approximate_token_count(input: &str) -> usize {
    input.split_whitespace().count()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPayload {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_prefix_is_required() {
        let (provider, name) = parse_model_provider("openrouter/openai/gpt-4o-mini").unwrap();
        assert_eq!(provider, LlmProvider::OpenRouter);
        assert_eq!(name, "openai/gpt-4o-mini");

        assert_eq!(parse_model_provider("poe/GPT-4o").unwrap().0, LlmProvider::Poe);
        assert!(parse_model_provider("gpt-4o").is_err());
        assert!(parse_model_provider("openrouter/ ").is_err());
        assert!(parse_model_provider("acme/model").is_err());
    }

    #[test]
    fn extracts_text_and_usage_from_chat_completion() {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"questions\": []}" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16 }
        });
        let (text, usage) = extract_text_and_usage(&body).unwrap();
        assert_eq!(text, "{\"questions\": []}");
        let usage = usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.response_tokens, 4);
    }

    #[test]
    fn payload_without_choices_is_rejected() {
        assert!(extract_text_and_usage(&serde_json::json!({ "error": "rate limited" })).is_none());
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(600);
        let shortened = preview(&long);
        assert!(shortened.ends_with("..."));
        assert_eq!(shortened.chars().count(), 503);
    }
}
