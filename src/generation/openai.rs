use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{CompletionOptions, GenerationClient};
use crate::error::GenerationError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 256;
pub const DEFAULT_IMAGE_SIZE: &str = "512x512";

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub completion_model: String,
    pub image_size: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.completion_model = model.into();
        self
    }

    pub fn with_image_size(mut self, size: impl Into<String>) -> Self {
        self.image_size = size.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for the OpenAI moderation, completion and image endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    inner: reqwest::Client,
    base_url: String,
    completion_model: String,
    image_size: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("completion_model", &self.completion_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::UpstreamFailure(
                "OpenAI client requires an API key".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
            .map_err(|e| GenerationError::UpstreamFailure(format!("Invalid OpenAI API key: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            completion_model: config.completion_model,
            image_size: config.image_size,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, GenerationError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.endpoint(path);
        tracing::debug!(url = %url, "OpenAI request");

        let response = self.inner.post(&url).json(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::UpstreamFailure(upstream_message(status, &text)));
        }

        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn moderate(&self, text: &str) -> Result<bool, GenerationError> {
        let response: ModerationResponse = self.post("moderations", &ModerationRequest { input: text }).await?;
        Ok(response.results.iter().any(|r| r.flagged))
    }

    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String, GenerationError> {
        let request = CompletionRequest {
            model: &self.completion_model,
            prompt,
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };
        let response: CompletionResponse = self.post("completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| GenerationError::UpstreamFailure("OpenAI returned no completion".to_string()))
    }

    async fn image(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ImageRequest {
            prompt,
            n: 1,
            size: &self.image_size,
        };
        let response: ImageResponse = self.post("images/generations", &request).await?;

        response
            .data
            .into_iter()
            .find_map(|image| image.url)
            .ok_or_else(|| GenerationError::UpstreamFailure("OpenAI returned no image".to_string()))
    }
}

/// Prefer the API's own error message; fall back to the raw body.
fn upstream_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => format!("OpenAI returned {}", status),
        Err(_) => format!("OpenAI returned {}: {}", status, body.trim()),
    }
}

#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    #[serde(default)]
    flagged: bool,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
