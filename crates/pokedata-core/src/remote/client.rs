//! HTTP client for an OpenAI-compatible Responses API.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{MalformedResponseError, RemoteError, ServiceError};
use crate::models::config::RemoteConfig;

use super::prompt::{ContentPart, VisionRequest};
use super::VisionService;

/// Vision client speaking the Responses API (`POST {api_base}/responses`).
#[derive(Debug, Clone)]
pub struct OpenAiVisionClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiVisionClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pokedata/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build a client from configuration; the API key is read from the named variable.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, ServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::NotConfigured(format!(
                    "{} environment variable not set",
                    config.api_key_env
                ))
            })?;
        Self::new(&config.api_base, api_key, &config.model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body(&self, request: &VisionRequest) -> Value {
        let content: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({"type": "input_text", "text": text}),
                ContentPart::Image(url) => json!({"type": "input_image", "image_url": url}),
            })
            .collect();

        json!({
            "model": self.model,
            "input": [
                {
                    "role": "system",
                    "content": [{"type": "input_text", "text": request.system}],
                },
                {"role": "user", "content": content},
            ],
            "max_output_tokens": request.max_output_tokens,
            "temperature": 0,
        })
    }
}

#[async_trait]
impl VisionService for OpenAiVisionClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &VisionRequest) -> Result<String, RemoteError> {
        let url = format!("{}/responses", self.api_base);
        debug!("POST {} (model {})", url, self.model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(ServiceError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Vision service returned an error");
            return Err(status_error(status.as_u16(), body).into());
        }

        let body = response.text().await.map_err(ServiceError::from)?;
        Ok(envelope_text(body)?)
    }
}

/// Decode a success body and pull out the model's text.
///
/// Both failures keep the raw body so it can be persisted for debugging.
pub fn envelope_text(body: String) -> Result<String, MalformedResponseError> {
    let envelope: Value = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return Err(MalformedResponseError::NotJson {
                error: e.to_string(),
                body,
            });
        }
    };
    response_text(&envelope).ok_or(MalformedResponseError::NoOutputText { body })
}

fn status_error(status: u16, body: String) -> ServiceError {
    match status {
        401 | 403 => ServiceError::Auth { status },
        429 => ServiceError::RateLimited,
        _ => ServiceError::Status {
            status,
            body: body.chars().take(200).collect(),
        },
    }
}

/// Pull the model's text out of a response envelope.
///
/// Tries Responses API `output[].content[].text`, then `output_text`, then
/// chat-completions `choices[0].message.content`.
pub fn response_text(envelope: &Value) -> Option<String> {
    let from_output: Vec<&str> = envelope
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if !from_output.is_empty() {
        return Some(from_output.concat());
    }

    if let Some(text) = envelope.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}
