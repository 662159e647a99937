// src/provider/openai_compat.rs — Generic OpenAI-compatible chat backend
//
// Used for Groq (default), OpenAI, Together, OpenRouter and any endpoint that
// speaks `POST {base_url}/chat/completions`.

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider, StopReason, TokenUsage};
use crate::infra::config::BackendConfig;
use crate::infra::errors::ConsultError;

/// Fallback wait when a 429 carries no usable `retry-after` header.
const DEFAULT_RATE_LIMIT_MS: u64 = 5_000;

pub struct OpenAICompatProvider {
    id_str: String,
    base_url: String,
    /// Explicit key; takes precedence over `api_key_env`.
    api_key: Option<String>,
    api_key_env: String,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, api_key_env: impl Into<String>) -> Self {
        Self {
            id_str: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            api_key_env: api_key_env.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(&config.provider, &config.base_url, &config.api_key_env)
    }

    /// Use a fixed key instead of reading the environment on each call.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Resolve the key at call time.
    fn resolve_api_key(&self) -> Result<String, ConsultError> {
        let key = match &self.api_key {
            Some(k) => Some(k.clone()),
            None => std::env::var(&self.api_key_env).ok(),
        };
        match key {
            Some(k) if !k.trim().is_empty() => Ok(k),
            _ => Err(ConsultError::MissingCredentials {
                backend: self.id_str.clone(),
                env_var: self.api_key_env.clone(),
            }),
        }
    }
}

/// Build the JSON body for `/chat/completions`.
pub(crate) fn build_body(request: &ChatRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system {
        messages.push(serde_json::json!({"role": "system", "content": system}));
    }
    for m in &request.messages {
        messages.push(serde_json::json!({
            "role": m.role.as_str(),
            "content": m.content,
        }));
    }

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    body
}

/// Turn a completion payload into a `ChatResponse`.
///
/// A missing choice or a non-string `content` is an `InvalidResponse`; an
/// empty string is passed through for the caller to judge.
pub(crate) fn parse_completion(
    backend: &str,
    resp: &serde_json::Value,
) -> Result<ChatResponse, ConsultError> {
    let choice = resp["choices"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| ConsultError::InvalidResponse {
            backend: backend.to_string(),
            message: "response has no choices".into(),
        })?;

    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| ConsultError::InvalidResponse {
            backend: backend.to_string(),
            message: "choice has no text content".into(),
        })?
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::Unknown,
    };

    Ok(ChatResponse {
        content,
        usage,
        stop_reason,
    })
}

/// Map a non-success HTTP status to the error taxonomy.
fn status_error(backend: &str, status: reqwest::StatusCode, body: String, retry_after: Option<u64>) -> ConsultError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return ConsultError::RateLimited {
            backend: backend.to_string(),
            retry_after_ms: retry_after.map(|s| s.saturating_mul(1000)).unwrap_or(DEFAULT_RATE_LIMIT_MS),
        };
    }
    let message = if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        format!("authentication rejected (HTTP {status})")
    } else {
        format!("HTTP {status}: {body}")
    };
    ConsultError::ServiceUnavailable {
        backend: backend.to_string(),
        message,
        retriable: status.is_server_error(),
    }
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn id(&self) -> &str {
        &self.id_str
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ConsultError> {
        let api_key = self.resolve_api_key()?;
        let body = build_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("User-Agent", format!("consultant/{}", env!("CARGO_PKG_VERSION")))
            .json(&body)
            .send()
            .await
            .map_err(|e| ConsultError::ServiceUnavailable {
                backend: self.id_str.clone(),
                message: e.to_string(),
                retriable: e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(&self.id_str, status, error_body, retry_after));
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| ConsultError::InvalidResponse {
                backend: self.id_str.clone(),
                message: format!("failed to parse response: {e}"),
            })?;

        let parsed = parse_completion(&self.id_str, &resp)?;
        if parsed.stop_reason == StopReason::MaxTokens {
            tracing::warn!(
                backend = %self.id_str,
                model = %request.model,
                "Completion hit max_tokens; output is truncated"
            );
        }
        Ok(parsed)
    }
}
