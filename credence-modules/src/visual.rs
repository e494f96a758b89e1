//! Visual context checker
//!
//! Asks a vision backend for a neutral caption of the attached media, then
//! checks whether the claim's sensational framing is supported by what the
//! image actually shows.

use async_trait::async_trait;
use credence_core::{AnalysisRequest, RequestField, SignalResult};
use std::collections::HashSet;
use tokio::time::Instant;
use tracing::debug;

use crate::{guarded, Assessment, ModuleError, SharedVision, SignalModule};

pub const VISUAL_MODULE_ID: &str = "visual_context";

const REQUIRES: &[RequestField] = &[RequestField::MediaRef];

const CAPTION_PROMPT: &str =
    "Describe the main content of this image in one concise, neutral sentence.";

/// Words used to dramatize claims; unsupported by the caption they signal a mismatch
const SENSATIONAL_KEYWORDS: &[&str] = &[
    "shocking", "cover-up", "secret", "exposed", "truth", "must", "leaked", "banned",
    "hidden", "proof", "unbelievable", "censored",
];

/// Function words ignored when comparing claim and caption
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "in", "on", "at", "to", "for", "with",
    "by", "from", "is", "are", "was", "were", "be", "been", "this", "that", "these",
    "those", "it", "its", "as", "into", "shows", "show", "image", "photo", "picture",
];

/// Context-match credibility of a claim against a caption, in [0, 1]
pub fn context_match(claim: &str, caption: &str) -> f64 {
    let claim_words = word_set(claim);
    let caption_words = word_set(caption);

    let unsupported = claim_words
        .iter()
        .filter(|w| SENSATIONAL_KEYWORDS.contains(&w.as_str()))
        .filter(|w| !caption_words.contains(*w))
        .count();

    let base: f64 = match unsupported {
        0 => 0.85,
        1 => 0.5,
        _ => 0.2,
    };

    let claim_content: HashSet<&String> = claim_words
        .iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()) && w.len() > 2)
        .collect();
    let shared = claim_content
        .iter()
        .filter(|w| caption_words.contains(**w))
        .count();

    // Claim and caption talk about different things
    if !claim_content.is_empty() && shared == 0 {
        (base - 0.15).max(0.05)
    } else {
        base
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Visual context checker module
pub struct VisualContextChecker {
    backend: Option<SharedVision>,
}

impl VisualContextChecker {
    pub fn new(backend: Option<SharedVision>) -> Self {
        Self { backend }
    }

    async fn assess(&self, request: &AnalysisRequest) -> Result<Assessment, ModuleError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| ModuleError::NotConfigured("no vision backend".to_string()))?;
        let media_ref = request.media_ref().unwrap_or_default();

        let caption = backend.describe(CAPTION_PROMPT, media_ref).await?;
        let caption = caption.trim();
        debug!(model = backend.model_name(), caption, "Media captioned");

        let Some(claim) = request.text() else {
            return Ok(Assessment::new(
                0.5,
                0.3,
                format!("No claim to compare against. Caption: '{}'", caption),
            ));
        };

        let score = context_match(claim, caption);
        let finding = if score < 0.5 {
            "High content mismatch"
        } else if score < 0.8 {
            "Moderate mismatch"
        } else {
            "Content appears relevant"
        };

        Ok(Assessment::new(
            score,
            0.6,
            format!("{}. Caption: '{}'", finding, caption),
        ))
    }
}

#[async_trait]
impl SignalModule for VisualContextChecker {
    fn id(&self) -> &str {
        VISUAL_MODULE_ID
    }

    fn requires(&self) -> &[RequestField] {
        REQUIRES
    }

    async fn analyze(&self, request: &AnalysisRequest, deadline: Instant) -> SignalResult {
        guarded(VISUAL_MODULE_ID, REQUIRES, request, deadline, self.assess(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendError, VisionBackend};
    use credence_core::SignalStatus;
    use std::sync::Arc;
    use std::time::Duration;

    struct MockVision(&'static str);

    #[async_trait]
    impl VisionBackend for MockVision {
        async fn describe(&self, _prompt: &str, _media_ref: &str) -> Result<String, BackendError> {
            Ok(self.0.to_string())
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    #[test]
    fn test_context_match_bands() {
        let caption = "a government building with people standing outside";
        assert_eq!(context_match("Crowd outside the government building", caption), 0.85);
        assert_eq!(context_match("SECRET government building", caption), 0.5);
        assert_eq!(
            context_match("SHOCKING secret government building EXPOSED", caption),
            0.2
        );
    }

    #[test]
    fn test_unrelated_caption_lowers_score() {
        let score = context_match("Flooding in the city centre", "a cat sleeping on a sofa");
        assert!((score - 0.7).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_analyze_with_backend() {
        let checker = VisualContextChecker::new(Some(Arc::new(MockVision(
            "a cat sleeping on a sofa",
        ))));
        let request = AnalysisRequest::builder()
            .text("SHOCKING secret footage EXPOSED")
            .media_ref("https://cdn.example.com/cat.jpg")
            .build()
            .unwrap();

        let result = checker.analyze(&request, deadline()).await;
        assert_eq!(result.status, SignalStatus::Success);
        assert!(result.raw_score.unwrap() < 0.2);
        assert!(result.rationale.contains("cat sleeping"));
    }

    #[tokio::test]
    async fn test_without_backend_fails() {
        let checker = VisualContextChecker::new(None);
        let request = AnalysisRequest::builder().media_ref("photo.jpg").build().unwrap();

        let result = checker.analyze(&request, deadline()).await;
        assert_eq!(result.status, SignalStatus::Failed);
        assert!(result.rationale.contains("Not configured"));
    }

    #[tokio::test]
    async fn test_skips_without_media() {
        let checker = VisualContextChecker::new(None);
        let request = AnalysisRequest::builder().text("claim").build().unwrap();

        let result = checker.analyze(&request, deadline()).await;
        assert_eq!(result.status, SignalStatus::Skipped);
    }
}
