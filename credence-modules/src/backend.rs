//! Vision backend abstraction
//!
//! Supports OpenAI-compatible APIs and Anthropic Claude for describing and
//! rating media. Media references that are http(s) URLs are sent by URL;
//! anything else is read from disk and inlined as base64.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::ModuleError;

/// Largest local file inlined into a request
const MAX_INLINE_BYTES: u64 = 20 * 1024 * 1024;

/// Vision backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Empty response")]
    EmptyResponse,

    #[error("Media error: {0}")]
    Media(String),
}

impl From<BackendError> for ModuleError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Config(msg) => ModuleError::NotConfigured(msg),
            BackendError::RateLimited => ModuleError::RateLimited("vision backend".to_string()),
            other => ModuleError::Backend(other.to_string()),
        }
    }
}

/// Generic vision backend trait
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Answer a prompt about the referenced media
    async fn describe(&self, prompt: &str, media_ref: &str) -> Result<String, BackendError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Thread-safe reference to a vision backend
pub type SharedVision = Arc<dyn VisionBackend>;

/// Media ready to be attached to a request
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// Remote media passed through by URL
    Url(String),
    /// Local media inlined as base64
    Inline { mime: &'static str, data: String },
}

impl MediaSource {
    /// URL form accepted by OpenAI-compatible APIs
    pub fn as_url(&self) -> String {
        match self {
            MediaSource::Url(url) => url.clone(),
            MediaSource::Inline { mime, data } => format!("data:{};base64,{}", mime, data),
        }
    }
}

/// Guess an image MIME type from a file extension
pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Resolve a media reference into something a backend can send
pub async fn resolve_media(media_ref: &str) -> Result<MediaSource, BackendError> {
    if media_ref.starts_with("http://") || media_ref.starts_with("https://") {
        return Ok(MediaSource::Url(media_ref.to_string()));
    }

    let path = Path::new(media_ref);
    let mime = mime_for(path)
        .ok_or_else(|| BackendError::Media(format!("unsupported media type: {}", media_ref)))?;

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| BackendError::Media(format!("{}: {}", media_ref, e)))?;
    if metadata.len() > MAX_INLINE_BYTES {
        return Err(BackendError::Media(format!(
            "{} is {} bytes, limit is {}",
            media_ref,
            metadata.len(),
            MAX_INLINE_BYTES
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BackendError::Media(format!("{}: {}", media_ref, e)))?;

    debug!("Inlined {} ({} bytes, {})", media_ref, bytes.len(), mime);

    Ok(MediaSource::Inline {
        mime,
        data: STANDARD.encode(bytes),
    })
}

/// OpenAI-compatible vision backend configuration
#[derive(Debug, Clone)]
pub struct OpenAIVisionConfig {
    /// API key
    pub api_key: String,
    /// Base URL (for OpenRouter, local servers, etc.)
    pub base_url: Option<String>,
    /// Model name
    pub model: String,
    /// Temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Max tokens
    pub max_tokens: u32,
}

impl Default for OpenAIVisionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 300,
        }
    }
}

impl OpenAIVisionConfig {
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn openrouter(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: Some("https://openrouter.ai/api/v1".to_string()),
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn local(base_url: &str, model: &str) -> Self {
        Self {
            api_key: "sk-local".to_string(),
            base_url: Some(base_url.to_string()),
            model: model.to_string(),
            ..Default::default()
        }
    }
}

/// OpenAI-compatible vision backend
pub struct OpenAIVision {
    client: Client<OpenAIConfig>,
    config: OpenAIVisionConfig,
}

impl OpenAIVision {
    /// `http` carries the shared proxy and timeout settings
    pub fn new(config: OpenAIVisionConfig, http: reqwest::Client) -> Result<Self, BackendError> {
        if config.api_key.is_empty() {
            return Err(BackendError::Config("missing API key".to_string()));
        }

        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        let client = Client::with_config(openai_config).with_http_client(http);

        Ok(Self { client, config })
    }
}

fn map_openai_error(e: OpenAIError) -> BackendError {
    let message = e.to_string();
    if message.to_lowercase().contains("rate limit") {
        BackendError::RateLimited
    } else {
        BackendError::Api(message)
    }
}

#[async_trait]
impl VisionBackend for OpenAIVision {
    async fn describe(&self, prompt: &str, media_ref: &str) -> Result<String, BackendError> {
        let media = resolve_media(media_ref).await?;

        let content = ChatCompletionRequestUserMessageContent::Array(vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: prompt.to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: media.as_url(),
                        detail: Some(ImageDetail::Low),
                    },
                },
            ),
        ]);

        let messages = vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map_err(|e| BackendError::Api(e.to_string()))?,
        )];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(messages)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build()
            .map_err(|e| BackendError::Api(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|s| !s.trim().is_empty())
            .ok_or(BackendError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Anthropic Claude vision backend configuration
#[derive(Debug, Clone)]
pub struct AnthropicVisionConfig {
    /// API key
    pub api_key: String,
    /// Model name (e.g., claude-3-5-sonnet-20241022)
    pub model: String,
    /// Max tokens
    pub max_tokens: u32,
}

impl AnthropicVisionConfig {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: 300,
        }
    }
}

/// Anthropic Claude vision backend
pub struct AnthropicVision {
    client: reqwest::Client,
    config: AnthropicVisionConfig,
}

impl AnthropicVision {
    pub fn new(config: AnthropicVisionConfig, client: reqwest::Client) -> Result<Self, BackendError> {
        if config.api_key.is_empty() {
            return Err(BackendError::Config("missing API key".to_string()));
        }
        Ok(Self { client, config })
    }

    fn image_block(media: &MediaSource) -> serde_json::Value {
        match media {
            MediaSource::Url(url) => serde_json::json!({
                "type": "image",
                "source": {"type": "url", "url": url}
            }),
            MediaSource::Inline { mime, data } => serde_json::json!({
                "type": "image",
                "source": {"type": "base64", "media_type": mime, "data": data}
            }),
        }
    }
}

#[async_trait]
impl VisionBackend for AnthropicVision {
    async fn describe(&self, prompt: &str, media_ref: &str) -> Result<String, BackendError> {
        let media = resolve_media(media_ref).await?;

        let request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        Self::image_block(&media),
                        {"type": "text", "text": prompt}
                    ]
                }
            ]
        });

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| BackendError::Api(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("Anthropic API error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Api(e.to_string()))?;

        json["content"]
            .as_array()
            .and_then(|arr| arr.iter().find(|block| block["type"] == "text"))
            .and_then(|block| block["text"].as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .ok_or(BackendError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Create a shared OpenAI-compatible vision backend
pub fn create_openai_vision(
    config: OpenAIVisionConfig,
    http: reqwest::Client,
) -> Result<SharedVision, BackendError> {
    Ok(Arc::new(OpenAIVision::new(config, http)?))
}

/// Create a shared Anthropic vision backend
pub fn create_anthropic_vision(
    config: AnthropicVisionConfig,
    http: reqwest::Client,
) -> Result<SharedVision, BackendError> {
    Ok(Arc::new(AnthropicVision::new(config, http)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remote_media_passes_by_url() {
        let media = resolve_media("https://cdn.example.com/photo.jpg").await.unwrap();
        assert_eq!(media, MediaSource::Url("https://cdn.example.com/photo.jpg".to_string()));
        assert_eq!(media.as_url(), "https://cdn.example.com/photo.jpg");
    }

    #[tokio::test]
    async fn test_local_media_is_inlined() {
        let path = std::env::temp_dir().join(format!("credence-media-{}.png", std::process::id()));
        tokio::fs::write(&path, b"not really a png").await.unwrap();

        let media = resolve_media(path.to_str().unwrap()).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        match &media {
            MediaSource::Inline { mime, data } => {
                assert_eq!(*mime, "image/png");
                assert_eq!(STANDARD.decode(data).unwrap(), b"not really a png");
            }
            other => panic!("expected inline media, got {other:?}"),
        }
        assert!(media.as_url().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_unsupported_or_missing_media() {
        assert!(matches!(
            resolve_media("clip.mov").await,
            Err(BackendError::Media(_))
        ));
        assert!(matches!(
            resolve_media("/nonexistent/credence/photo.jpg").await,
            Err(BackendError::Media(_))
        ));
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("a/B.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for(Path::new("a.webp")), Some("image/webp"));
        assert_eq!(mime_for(Path::new("noext")), None);
    }

    fn proxied_client() -> reqwest::Client {
        let config = credence_net::HttpConfig::default().with_proxy("socks5h://127.0.0.1:9050");
        credence_net::create_client(&config).unwrap()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        assert!(matches!(
            OpenAIVision::new(OpenAIVisionConfig::default(), proxied_client()),
            Err(BackendError::Config(_))
        ));
        assert!(matches!(
            AnthropicVision::new(AnthropicVisionConfig::new("", "claude"), proxied_client()),
            Err(BackendError::Config(_))
        ));
        let err: ModuleError = BackendError::Config("missing API key".to_string()).into();
        assert!(matches!(err, ModuleError::NotConfigured(_)));
    }

    #[test]
    fn test_presets_build_on_shared_client() {
        let openrouter = OpenAIVisionConfig::openrouter("sk-or", "qwen/qwen2.5-vl-72b-instruct");
        assert_eq!(openrouter.base_url.as_deref(), Some("https://openrouter.ai/api/v1"));

        let local = OpenAIVisionConfig::local("http://localhost:11434/v1", "llava");
        assert!(!local.api_key.is_empty());

        for config in [openrouter, local] {
            let backend = create_openai_vision(config, proxied_client()).unwrap();
            assert!(!backend.model_name().is_empty());
        }
        let claude = create_anthropic_vision(
            AnthropicVisionConfig::new("sk-ant", "claude-3-5-sonnet-20241022"),
            proxied_client(),
        )
        .unwrap();
        assert_eq!(claude.model_name(), "claude-3-5-sonnet-20241022");
    }
}
