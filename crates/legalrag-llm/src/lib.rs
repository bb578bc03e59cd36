//! Chat-completions client for OpenAI-compatible endpoints (Groq by default).
//!
//! Providers differ only by base URL, model name and API key. Transport
//! failures, timeouts, HTTP 429 and 5xx are reported as retryable
//! [`Error::LanguageModel`] errors; callers decide whether to retry.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use legalrag_core::config::LlmSettings;
use legalrag_core::traits::LanguageModel;
use legalrag_core::{is_retryable_status, Error, Result};

pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";

pub struct OpenAiCompatibleChat {
    client: reqwest::Client,
    /// e.g. "https://api.groq.com/openai/v1"
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatibleChat {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(transport_error)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature: 0.0,
            max_tokens: 1024,
        })
    }

    /// API key resolution: `llm.api_key` > `GROQ_API_KEY` > empty.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = if settings.api_key.is_empty() {
            std::env::var(GROQ_API_KEY_ENV).unwrap_or_default()
        } else {
            settings.api_key.clone()
        };
        Ok(Self::new(&settings.base_url, &settings.model, &api_key, Duration::from_secs(settings.timeout_secs))?
            .with_sampling(settings.temperature, settings.max_tokens))
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleChat {
    fn model_id(&self) -> &str { &self.model }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::LanguageModel {
                message: format!("{} API error {status}: {text}", self.model),
                retryable: is_retryable_status(status.as_u16()),
            });
        }

        let json: Value = resp.json().await.map_err(transport_error)?;
        let content = json["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .ok_or_else(|| Error::LanguageModel { message: "no choices in response".into(), retryable: false })?;
        debug!(model = %self.model, prompt_chars = prompt.len(), answer_chars = content.len(), "completion received");
        Ok(content.to_string())
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::LanguageModel { message: e.to_string(), retryable: e.is_timeout() || e.is_connect() }
}
