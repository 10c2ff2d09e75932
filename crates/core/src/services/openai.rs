use crate::error::{ConfigError, ServiceError};
use crate::traits::{EmbeddingService, LanguageModel};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";
pub const OPENAI_EMBEDDING_DIMENSIONS: usize = 1_536;

const EMBEDDINGS: &str = "embeddings";
const CHAT: &str = "chat";

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Reads `OPENAI_API_KEY` and, when set, `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = non_empty_env("OPENAI_API_KEY")
            .ok_or_else(|| ConfigError::MissingApiKey("OPENAI_API_KEY".to_string()))?;
        let mut settings = Self::new(api_key);
        if let Some(base_url) = non_empty_env("OPENAI_BASE_URL") {
            settings.base_url = base_url;
        }
        Ok(settings)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

struct Transport {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl Transport {
    fn new(settings: &OpenAiSettings) -> Result<Self, ConfigError> {
        if settings.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey("openai".to_string()));
        }

        // Url::join drops the last path segment unless the base ends with '/'.
        let mut base = settings.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client: Client::builder().timeout(settings.timeout).build()?,
            base_url: Url::parse(&base)?,
            api_key: settings.api_key.clone(),
        })
    }

    async fn post_json(&self, service: &'static str, path: &str, body: &Value) -> Result<Value, ServiceError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|error| ServiceError::invalid_response(service, error.to_string()))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|error| ServiceError::unavailable(service, error.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| ServiceError::unavailable(service, error.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(service, status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|error| ServiceError::invalid_response(service, error.to_string()))
    }
}

fn classify_failure(service: &str, status: StatusCode, body: &str) -> ServiceError {
    let details = format!("{status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ServiceError::RateLimited {
            service: service.to_string(),
            details,
        };
    }
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return ServiceError::unavailable(service, details);
    }
    if is_content_filter_error(body) {
        return ServiceError::ContentFiltered {
            service: service.to_string(),
            details,
        };
    }
    ServiceError::invalid_response(service, details)
}

fn is_content_filter_error(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|parsed| {
            parsed
                .pointer("/error/code")
                .and_then(Value::as_str)
                .map(|code| matches!(code, "content_filter" | "content_policy_violation"))
        })
        .unwrap_or(false)
}

/// Embeddings over `POST {base}/embeddings`.
pub struct OpenAiEmbedder {
    transport: Transport,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        settings: &OpenAiSettings,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            transport: Transport::new(settings)?,
            model: model.into(),
            dimensions,
        })
    }

    // Older embedding models reject the `dimensions` parameter.
    fn request_body(&self, texts: &[String]) -> Value {
        let mut body = json!({
            "model": self.model,
            "input": texts,
        });
        if self.model.starts_with("text-embedding-3") {
            body["dimensions"] = json!(self.dimensions);
        }
        body
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip_all, fields(model = %self.model, texts = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = self.request_body(texts);
        let response = self.transport.post_json(EMBEDDINGS, "embeddings", &body).await?;
        parse_embeddings(&response, texts.len())
    }
}

/// Places each `data[].embedding` at its `index`, so the output follows input order.
fn parse_embeddings(response: &Value, expected: usize) -> Result<Vec<Vec<f32>>, ServiceError> {
    let data = response
        .pointer("/data")
        .and_then(Value::as_array)
        .ok_or_else(|| ServiceError::invalid_response(EMBEDDINGS, "missing data array"))?;

    if data.len() != expected {
        return Err(ServiceError::invalid_response(
            EMBEDDINGS,
            format!("expected {expected} embeddings, got {}", data.len()),
        ));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, item) in data.iter().enumerate() {
        let index = item
            .pointer("/index")
            .and_then(Value::as_u64)
            .map(|index| index as usize)
            .unwrap_or(position);
        let embedding = item
            .pointer("/embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| ServiceError::invalid_response(EMBEDDINGS, "missing embedding"))?
            .iter()
            .map(|value| value.as_f64().map(|number| number as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| ServiceError::invalid_response(EMBEDDINGS, "non-numeric embedding value"))?;

        match slots.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(embedding),
            _ => {
                return Err(ServiceError::invalid_response(
                    EMBEDDINGS,
                    format!("embedding index {index} is out of range or repeated"),
                ))
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Single-message completions over `POST {base}/chat/completions`.
pub struct OpenAiChatModel {
    transport: Transport,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(settings: &OpenAiSettings, model: impl Into<String>) -> Result<Self, ConfigError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ConfigError::MissingModelName);
        }
        Ok(Self {
            transport: Transport::new(settings)?,
            model,
            temperature: 0.0,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });
        let response = self.transport.post_json(CHAT, "chat/completions", &body).await?;
        let answer = parse_completion(&response)?;
        debug!(answer_chars = answer.len(), "completion received");
        Ok(answer)
    }
}

fn parse_completion(response: &Value) -> Result<String, ServiceError> {
    let choice = response
        .pointer("/choices/0")
        .ok_or_else(|| ServiceError::invalid_response(CHAT, "response has no choices"))?;

    if choice.pointer("/finish_reason").and_then(Value::as_str) == Some("content_filter") {
        return Err(ServiceError::ContentFiltered {
            service: CHAT.to_string(),
            details: "completion stopped by the content filter".to_string(),
        });
    }

    choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ServiceError::invalid_response(CHAT, "choice has no message content"))
}
