//! Chat-completion client for the classification and generation calls.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (the
//! original deployment uses Groq). Same transport behavior as the
//! embedding client: lazily built reqwest client, bounded timeout, and
//! exponential-backoff retries on 429/5xx. Retries are deliberately low —
//! a user is waiting on the other end of every call.

use anyhow::{Context, Result};
use tokio::sync::OnceCell;

use crate::config::LlmConfig;
use crate::embedding::post_json_with_retry;

/// Per-call knobs for [`LlmClient::complete`].
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Override the configured model (used for the cheap chitchat model).
    pub model: Option<String>,
    pub temperature: f64,
    /// Constrain the response to a JSON object (structured output).
    pub json_object: bool,
}

/// Client for the external text→text service.
pub struct LlmClient {
    config: LlmConfig,
    api_key: String,
    client: OnceCell<reqwest::Client>,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
        Ok(Self {
            config: config.clone(),
            api_key,
            client: OnceCell::new(),
        })
    }

    /// Build a client against an explicit base URL with a dummy key.
    /// Intended for tests that must never be reached over the network.
    pub fn with_base_url(mut config: LlmConfig, base_url: &str) -> Self {
        config.base_url = base_url.to_string();
        Self {
            config,
            api_key: "test".to_string(),
            client: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// One prompt in, the model's text out.
    pub async fn complete(&self, prompt: &str, opts: &CompletionOptions) -> Result<String> {
        let client = self
            .client
            .get_or_try_init(|| async {
                Ok::<_, anyhow::Error>(
                    reqwest::Client::builder()
                        .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
                        .build()?,
                )
            })
            .await?;

        let model = opts.model.as_deref().unwrap_or(&self.config.model);
        let mut body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": opts.temperature,
        });
        if opts.json_object {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let json = post_json_with_retry(
            client,
            &url,
            Some(&self.api_key),
            &body,
            self.config.max_retries,
        )
        .await
        .context("Completion request failed")?;

        parse_completion(&json)
    }
}

/// Pull the first choice's message text out of a chat-completions response.
fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice_content() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  jawaban  " } }
            ]
        });
        assert_eq!(parse_completion(&json).unwrap(), "jawaban");
    }

    #[test]
    fn missing_content_is_an_error() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_completion(&json).is_err());
        assert!(parse_completion(&serde_json::json!({})).is_err());
    }
}
