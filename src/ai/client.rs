//! Model provider clients
//!
//! Thin HTTP wrappers around the OpenAI-compatible chat/image endpoints and
//! the Anthropic messages API. Every call goes through [`with_retry`], which
//! makes a fixed number of attempts with linear backoff and only retries
//! transient failures.

use crate::config::{AiConfig, ProviderConfig, RetryConfig};
use async_trait::async_trait;
use backon::Retryable;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const USER_AGENT: &str = concat!("sitecraft/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AiError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider rejected the API key")]
    InvalidApiKey,

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("no model available for {0}")]
    NoModelAvailable(String),

    #[error("invalid request: {0}")]
    Validation(String),
}

impl AiError {
    /// Transient failures worth another attempt
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout
    } else {
        AiError::Transport(e.to_string())
    }
}

/// Fixed attempt count, `base_delay * attempt` between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Delays between attempts, one fewer than `max_attempts`
    pub fn backoff(&self) -> impl Iterator<Item = Duration> + Send + Sync + Unpin + 'static {
        let policy = *self;
        (1..policy.max_attempts).map(move |attempt| policy.delay_for(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 0;
    op.retry(policy.backoff())
        .when(|e: &AiError| e.should_retry())
        .notify(|e, delay| {
            attempt += 1;
            tracing::warn!(
                "{} failed (attempt {}/{}), retrying in {}ms: {}",
                label,
                attempt,
                policy.max_attempts,
                delay.as_millis(),
                e
            );
        })
        .await
}

/// A single-turn text completion
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 2048,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub b64_json: Option<String>,
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

#[async_trait]
pub trait TextModel: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, model: &str, request: &TextRequest) -> Result<String, AiError>;
}

#[async_trait]
pub trait ImageModel: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_image(
        &self,
        model: &str,
        request: &ImageRequest,
    ) -> Result<GeneratedImage, AiError>;
}

fn build_http(timeout_secs: u64) -> Result<Client, AiError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AiError::Transport(e.to_string()))
}

/// Map a non-success response to an error
async fn error_for_status(res: reqwest::Response) -> AiError {
    match res.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiError::InvalidApiKey,
        StatusCode::TOO_MANY_REQUESTS => AiError::RateLimited,
        s => {
            let body = res.text().await.unwrap_or_default();
            AiError::Http {
                status: s.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            }
        }
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(res: reqwest::Response) -> Result<T, AiError> {
    if !res.status().is_success() {
        return Err(error_for_status(res).await);
    }
    res.json::<T>()
        .await
        .map_err(|e| AiError::InvalidResponse(e.to_string()))
}

// ---------------------------------------------------------------------------
// OpenAI-compatible
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
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

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<GeneratedImage>,
}

/// Client for `/chat/completions` and `/images/generations`
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(
        provider: &ProviderConfig,
        api_key: &str,
        timeout_secs: u64,
        retry: RetryPolicy,
    ) -> Result<Self, AiError> {
        Ok(Self {
            http: build_http(timeout_secs)?,
            api_key: api_key.to_string(),
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Client for the configured key, or `None` when no key is set
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, AiError> {
        config
            .openai
            .key()
            .map(|key| {
                Self::new(
                    &config.openai,
                    key,
                    config.timeout_secs,
                    RetryPolicy::from_config(&config.retry),
                )
            })
            .transpose()
    }

    async fn send_chat(&self, body: &ChatRequest<'_>) -> Result<String, AiError> {
        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let parsed: ChatResponse = read_json(res).await?;
        parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AiError::InvalidResponse("No text content in response".to_string()))
    }

    async fn send_image(&self, body: &ImageGenerationRequest<'_>) -> Result<GeneratedImage, AiError> {
        let res = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let parsed: ImageGenerationResponse = read_json(res).await?;
        parsed
            .data
            .into_iter()
            .find(|img| img.url.is_some() || img.b64_json.is_some())
            .ok_or_else(|| AiError::InvalidResponse("No image in response".to_string()))
    }
}

#[async_trait]
impl TextModel for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn complete(&self, model: &str, request: &TextRequest) -> Result<String, AiError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        let body = ChatRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        with_retry(&self.retry, "OpenAI chat completion", || self.send_chat(&body)).await
    }
}

#[async_trait]
impl ImageModel for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate_image(
        &self,
        model: &str,
        request: &ImageRequest,
    ) -> Result<GeneratedImage, AiError> {
        let body = ImageGenerationRequest {
            model,
            prompt: &request.prompt,
            size: &request.size,
            n: 1,
        };
        with_retry(&self.retry, "OpenAI image generation", || self.send_image(&body)).await
    }
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

/// Client for the Anthropic messages API
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl AnthropicClient {
    pub fn new(
        provider: &ProviderConfig,
        api_key: &str,
        timeout_secs: u64,
        retry: RetryPolicy,
    ) -> Result<Self, AiError> {
        Ok(Self {
            http: build_http(timeout_secs)?,
            api_key: api_key.to_string(),
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, AiError> {
        config
            .anthropic
            .key()
            .map(|key| {
                Self::new(
                    &config.anthropic,
                    key,
                    config.timeout_secs,
                    RetryPolicy::from_config(&config.retry),
                )
            })
            .transpose()
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<String, AiError> {
        let res = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let parsed: MessagesResponse = read_json(res).await?;
        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();
        if text.trim().is_empty() {
            return Err(AiError::InvalidResponse(
                "No text content in response".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextModel for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn complete(&self, model: &str, request: &TextRequest) -> Result<String, AiError> {
        let body = MessagesRequest {
            model,
            max_tokens: request.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            system: request.system.as_deref(),
            temperature: request.temperature,
        };
        with_retry(&self.retry, "Anthropic messages", || self.send(&body)).await
    }
}
