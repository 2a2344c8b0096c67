use serde::Serialize;

use crate::config::{GatewayConfig, GATEWAY_API_KEY_ENV};
use crate::error::{ParritaError, Result};
use crate::model::{ChatMessage, MessageRole};

/// Client for the hosted LLM gateway (any OpenAI-compatible
/// `chat/completions` endpoint).
pub struct GatewayClient {
    config: GatewayConfig,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// One message in the payload sent upstream.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayMessage {
    pub role: String,
    pub content: String,
}

impl GatewayMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn from_history(message: &ChatMessage) -> Self {
        Self {
            role: match message.role {
                MessageRole::User => "user".into(),
                MessageRole::Assistant => "assistant".into(),
            },
            content: message.content.clone(),
        }
    }
}

impl GatewayClient {
    /// Create a gateway client from configuration, resolving the API key
    /// from config or the environment.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        Ok(Self {
            config: config.clone(),
            api_key,
            client: reqwest::Client::new(),
        })
    }

    /// Start a streamed completion. Returns the raw response so the caller
    /// can relay the SSE body chunk-by-chunk; non-2xx statuses are mapped
    /// to [`ParritaError::Gateway`] with the upstream code preserved.
    pub async fn stream_chat(&self, messages: &[GatewayMessage]) -> Result<reqwest::Response> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            tracing::error!(status, body = %text, "gateway returned an error");
            return Err(ParritaError::Gateway {
                status,
                message: text,
            });
        }

        Ok(resp)
    }
}

/// Extract the content token from one SSE line of an OpenAI-compatible
/// stream. Returns `None` for non-data lines, `[DONE]`, and deltas
/// without content (role announcements, finish chunks).
pub fn extract_stream_delta(line: &str) -> Option<String> {
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        return None;
    }
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    parsed["choices"][0]["delta"]["content"]
        .as_str()
        .map(|s| s.to_string())
}

/// Resolve the gateway API key from config or the environment.
fn resolve_api_key(config: &GatewayConfig) -> Result<String> {
    if let Some(ref key) = config.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }

    let env_var_name = config.env_var.as_deref().unwrap_or(GATEWAY_API_KEY_ENV);

    std::env::var(env_var_name).map_err(|_| {
        ParritaError::Config(format!(
            "the LLM gateway requires an API key (set gateway.api_key or {env_var_name})"
        ))
    })
}
