//! Gemini `generateContent` client for feedback text and diary illustrations

use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use super::{Generation, ImageGenerator, ImagePrompt, TextGenerator};
use crate::text::truncate_chars;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection and model settings for [`GeminiClient`]
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Duration,
    /// Extra attempts after a transient transport failure
    pub max_retries: usize,
    /// Linear backoff step between retries
    pub retry_backoff: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            timeout: Duration::from_secs(90),
            max_retries: 2,
            retry_backoff: Duration::from_millis(1200),
        }
    }
}

impl GeminiConfig {
    /// Fill the API key (`GEMINI_API_KEY`, then `GOOGLE_API_KEY`) and the
    /// `GEMINI_API_BASE` override from the environment.
    pub fn with_env(mut self) -> Self {
        if let Some(base) = non_empty_env("GEMINI_API_BASE") {
            self.api_base = base;
        }
        if self.api_key.is_none() {
            self.api_key = non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"));
        }
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(mut config: GeminiConfig) -> anyhow::Result<Self> {
        config.api_base = config.api_base.trim().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        if config.api_key.is_none() {
            tracing::warn!("No Gemini API key configured; generative calls will fail");
        }
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.config.api_base, model_path)
    }

    async fn post_with_transport_retries(
        &self,
        endpoint: &str,
        api_key: &str,
        payload: &Value,
    ) -> anyhow::Result<reqwest::Response> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;
        loop {
            let result = self
                .http
                .post(endpoint)
                .query(&[("key", api_key)])
                .json(payload)
                .send()
                .await;
            match result {
                Ok(response) => return Ok(response),
                Err(err) if is_retryable_transport_error(&err) && attempt < max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Gemini transport retry {}/{} after transient request failure: {}",
                        attempt,
                        max_retries,
                        err
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt as u32).await;
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("Gemini request failed ({endpoint})")));
                }
            }
        }
    }

    async fn generate(&self, model: &str, payload: Value) -> anyhow::Result<Value> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            bail!("GEMINI_API_KEY (or GOOGLE_API_KEY) not set");
        };
        let endpoint = self.endpoint_for_model(model);
        tracing::debug!("POST {endpoint}");
        let response = self
            .post_with_transport_retries(&endpoint, api_key, &payload)
            .await?;
        response_json_or_error(response).await
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, instruction: &str, input: &str) -> Generation<String> {
        let payload = text_payload(instruction, input);
        match self.generate(&self.config.text_model, payload).await {
            Ok(body) => match extract_text(&body) {
                Some(text) => Generation::Produced(text),
                None => Generation::Empty,
            },
            Err(e) => Generation::Failed(format!("{e:#}")),
        }
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, prompt: &ImagePrompt) -> Generation<Vec<u8>> {
        let payload = image_payload(prompt);
        let body = match self.generate(&self.config.image_model, payload).await {
            Ok(body) => body,
            Err(e) => return Generation::Failed(format!("{e:#}")),
        };
        match extract_image(&body) {
            Ok(Some(bytes)) => Generation::Produced(bytes),
            Ok(None) => {
                let candidates = body
                    .get("candidates")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                tracing::debug!("Gemini image response had no inline data ({candidates} candidates)");
                Generation::Empty
            }
            Err(e) => Generation::Failed(format!("{e:#}")),
        }
    }
}

fn system_instruction(text: &str) -> Value {
    json!({ "parts": [{ "text": text }] })
}

fn text_payload(instruction: &str, input: &str) -> Value {
    json!({
        "systemInstruction": system_instruction(instruction),
        "contents": [{ "role": "user", "parts": [{ "text": input }] }],
    })
}

fn image_payload(prompt: &ImagePrompt) -> Value {
    json!({
        "systemInstruction": system_instruction(ImagePrompt::system_instruction()),
        "contents": [{ "role": "user", "parts": [{ "text": prompt.render() }] }],
        "generationConfig": { "responseModalities": ["IMAGE"] },
    })
}

async fn response_json_or_error(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .context("Gemini response body read failed")?;
    if !status.is_success() {
        bail!(
            "Gemini request failed ({}): {}",
            status.as_u16(),
            truncate_chars(&body, 512)
        );
    }
    serde_json::from_str(&body).context("Gemini returned invalid JSON payload")
}

/// Only timeouts and connection failures are worth another attempt.
fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn first_candidate_parts(body: &Value) -> &[Value] {
    body.get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

/// Concatenate the text parts of the first candidate.
pub fn extract_text(body: &Value) -> Option<String> {
    let text: String = first_candidate_parts(body)
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Decode the first inline image in any candidate.
pub fn extract_image(body: &Value) -> anyhow::Result<Option<Vec<u8>>> {
    let candidates = body
        .get("candidates")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);
        for part in parts {
            let data = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(|inline| inline.get("data"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let bytes = BASE64
                .decode(data.as_bytes())
                .context("Gemini image base64 decode failed")?;
            return Ok(Some(bytes));
        }
    }
    Ok(None)
}
