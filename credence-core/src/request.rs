//! Analysis requests
//!
//! A request is one content item to assess. It is immutable once built and
//! is shared read-only with every signal module during a dispatch.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use thiserror::Error;
use uuid::Uuid;

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)https?://(?:[^@/\s]+@)?(\[[0-9a-f:.]+\]|[a-z0-9.\-]+)(?::\d{1,5})?(?:[/?#]\S*)?$").unwrap()
});

/// Errors raised while building a request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Request has no text, source URL or media reference")]
    Empty,

    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),
}

/// A field of the request a module may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestField {
    Text,
    SourceUrl,
    MediaRef,
}

impl std::fmt::Display for RequestField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestField::Text => write!(f, "text"),
            RequestField::SourceUrl => write!(f, "source_url"),
            RequestField::MediaRef => write!(f, "media_ref"),
        }
    }
}

/// A content item submitted for credibility analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    id: Uuid,
    text: Option<String>,
    source_url: Option<String>,
    media_ref: Option<String>,
}

impl AnalysisRequest {
    /// Create a new request builder
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn media_ref(&self) -> Option<&str> {
        self.media_ref.as_deref()
    }

    /// Whether the given field is present
    pub fn has(&self, field: RequestField) -> bool {
        match field {
            RequestField::Text => self.text.is_some(),
            RequestField::SourceUrl => self.source_url.is_some(),
            RequestField::MediaRef => self.media_ref.is_some(),
        }
    }

    /// Fields from `required` that this request lacks
    pub fn missing(&self, required: &[RequestField]) -> Vec<RequestField> {
        required.iter().copied().filter(|f| !self.has(*f)).collect()
    }

    /// Lower-cased host of the source URL, without `www.` and port
    pub fn source_host(&self) -> Option<String> {
        self.source_url.as_deref().and_then(host_of)
    }

    /// Content hash of the request fields, stable across request ids
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [&self.text, &self.source_url, &self.media_ref] {
            hasher.update(part.as_deref().unwrap_or("").as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())[..16].to_string()
    }
}

/// Extract the registrable host part of an http(s) URL
pub fn host_of(url: &str) -> Option<String> {
    let caps = URL_REGEX.captures(url.trim())?;
    let host = caps.get(1)?.as_str().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Builder for analysis requests
#[derive(Debug, Default)]
pub struct RequestBuilder {
    text: Option<String>,
    source_url: Option<String>,
    media_ref: Option<String>,
}

impl RequestBuilder {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn media_ref(mut self, media: impl Into<String>) -> Self {
        self.media_ref = Some(media.into());
        self
    }

    /// Set any subset of fields from optional values
    pub fn fields(
        mut self,
        text: Option<String>,
        source_url: Option<String>,
        media_ref: Option<String>,
    ) -> Self {
        self.text = text;
        self.source_url = source_url;
        self.media_ref = media_ref;
        self
    }

    pub fn build(self) -> Result<AnalysisRequest, RequestError> {
        let text = non_blank(self.text);
        let source_url = non_blank(self.source_url);
        let media_ref = non_blank(self.media_ref);

        if text.is_none() && source_url.is_none() && media_ref.is_none() {
            return Err(RequestError::Empty);
        }

        if let Some(url) = &source_url {
            if host_of(url).is_none() {
                return Err(RequestError::InvalidUrl(url.clone()));
            }
        }

        Ok(AnalysisRequest {
            id: Uuid::new_v4(),
            text,
            source_url,
            media_ref,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
