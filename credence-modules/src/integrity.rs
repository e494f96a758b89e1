//! Media integrity checker
//!
//! Asks a vision backend to rate how likely the media is authentic
//! (0 = synthetic or manipulated, 100 = authentic).

use async_trait::async_trait;
use credence_core::{AnalysisRequest, RequestField, SignalResult};
use regex::Regex;
use std::sync::LazyLock;
use tokio::time::Instant;

use crate::{guarded, Assessment, ModuleError, SharedVision, SignalModule};

pub const INTEGRITY_MODULE_ID: &str = "media_integrity";

const REQUIRES: &[RequestField] = &[RequestField::MediaRef];

const RATING_PROMPT: &str = "Rate from 0 to 100 how likely this image is an authentic, \
unmanipulated photograph (0 = clearly synthetic or edited, 100 = clearly authentic). \
Reply with the number first, then one short sentence naming the visual evidence.";

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

/// First number in a reply, if it is a valid percentage
pub fn parse_rating(reply: &str) -> Option<f64> {
    NUMBER
        .find(reply)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| (0.0..=100.0).contains(v))
}

/// Media integrity module
pub struct MediaIntegrityChecker {
    backend: Option<SharedVision>,
}

impl MediaIntegrityChecker {
    pub fn new(backend: Option<SharedVision>) -> Self {
        Self { backend }
    }

    async fn assess(&self, request: &AnalysisRequest) -> Result<Assessment, ModuleError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| ModuleError::NotConfigured("no vision backend".to_string()))?;

        let reply = backend
            .describe(RATING_PROMPT, request.media_ref().unwrap_or_default())
            .await?;
        let rating = parse_rating(&reply)
            .ok_or_else(|| ModuleError::Parse(format!("no 0-100 rating in reply: {}", reply.trim())))?;

        let finding = if rating < 35.0 {
            "High probability of synthetic manipulation"
        } else if rating < 80.0 {
            "Manipulation status is inconclusive"
        } else {
            "No sign of manipulation"
        };

        Ok(Assessment::new(
            rating,
            0.5,
            format!("{} (authenticity {:.0}/100): {}", finding, rating, reply.trim()),
        ))
    }
}

#[async_trait]
impl SignalModule for MediaIntegrityChecker {
    fn id(&self) -> &str {
        INTEGRITY_MODULE_ID
    }

    fn requires(&self) -> &[RequestField] {
        REQUIRES
    }

    async fn analyze(&self, request: &AnalysisRequest, deadline: Instant) -> SignalResult {
        guarded(INTEGRITY_MODULE_ID, REQUIRES, request, deadline, self.assess(request)).await
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

    fn media_request() -> AnalysisRequest {
        AnalysisRequest::builder().media_ref("https://cdn.example.com/a.png").build().unwrap()
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("15 - warped hands and smeared text"), Some(15.0));
        assert_eq!(parse_rating("Authenticity: 92.5"), Some(92.5));
        assert_eq!(parse_rating("450"), None);
        assert_eq!(parse_rating("cannot tell"), None);
    }

    #[tokio::test]
    async fn test_rating_is_raw_score() {
        let checker = MediaIntegrityChecker::new(Some(Arc::new(MockVision(
            "20. Lighting on the face does not match the background.",
        ))));

        let result = checker
            .analyze(&media_request(), Instant::now() + Duration::from_secs(1))
            .await;

        assert_eq!(result.status, SignalStatus::Success);
        assert_eq!(result.raw_score, Some(20.0));
        assert!(result.rationale.contains("synthetic"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_fails() {
        let checker = MediaIntegrityChecker::new(Some(Arc::new(MockVision("I am not sure."))));

        let result = checker
            .analyze(&media_request(), Instant::now() + Duration::from_secs(1))
            .await;

        assert_eq!(result.status, SignalStatus::Failed);
    }
}
