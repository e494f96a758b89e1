//! Tone analyzer
//!
//! Scores how sensational a claim reads. Valence comes from the VADER
//! sentiment model, which already accounts for boosters, negation, ALL-CAPS
//! emphasis and exclamation marks.
//!
//! Highly positive and highly negative text are both treated as sensational.
//! Clickbait phrasing and shouting raise the score further.

use async_trait::async_trait;
use credence_core::{AnalysisRequest, RequestField, SignalResult};
use std::sync::LazyLock;
use tokio::time::Instant;
use vader_sentiment::SentimentIntensityAnalyzer;

use crate::{guarded, Assessment, ModuleError, SignalModule};

pub const TONE_MODULE_ID: &str = "tone";

const REQUIRES: &[RequestField] = &[RequestField::Text];

static VADER: LazyLock<SentimentIntensityAnalyzer<'static>> =
    LazyLock::new(SentimentIntensityAnalyzer::new);

/// Phrases typical of clickbait and manipulative framing
const CLICKBAIT_PHRASES: &[&str] = &[
    "you won't believe",
    "must watch",
    "must see",
    "must read",
    "what happens next",
    "they don't want you to know",
    "before it's deleted",
    "share before",
    "breaking",
    "the truth about",
    "doctors hate",
    "wake up",
    "mainstream media won't",
    "exposed",
    "cover-up",
    "100%",
];

/// Tone scores for one text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneScores {
    /// Normalized valence in [-1, 1]
    pub compound: f64,
    /// Clickbait phrase density in [0, 1]
    pub clickbait: f64,
    /// Share of shouted (ALL-CAPS) words in [0, 1]
    pub shouting: f64,
}

impl ToneScores {
    /// Sensationalism in [0, 1]
    pub fn sensationalism(&self) -> f64 {
        let base = self.compound.abs().max(self.clickbait);
        (base + (1.0 - base) * 0.5 * self.shouting).clamp(0.0, 1.0)
    }
}

/// Score a text with the sentiment model and clickbait cues
pub fn score_text(text: &str) -> ToneScores {
    let compound = VADER
        .polarity_scores(text)
        .get("compound")
        .copied()
        .unwrap_or(0.0)
        .clamp(-1.0, 1.0);

    let lowered = text.to_lowercase();
    let clickbait_hits: usize = CLICKBAIT_PHRASES
        .iter()
        .map(|p| lowered.matches(p).count())
        .sum();
    let clickbait = (clickbait_hits as f64 * 0.35).min(1.0);

    let words: Vec<&str> = text.split_whitespace().collect();
    let shouting = if words.is_empty() {
        0.0
    } else {
        words.iter().filter(|w| is_shouted(w)).count() as f64 / words.len() as f64
    };

    ToneScores {
        compound,
        clickbait,
        shouting,
    }
}

fn is_shouted(token: &str) -> bool {
    let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
}

fn rationale_for(percent: f64) -> &'static str {
    if percent > 80.0 {
        "Tone is extremely polarised; often suggests sensationalism or strong bias"
    } else if percent > 50.0 {
        "Tone is strongly opinionated; caution advised regarding emotional appeals"
    } else if percent > 20.0 {
        "Tone shows mild polarity but remains largely objective"
    } else {
        "Tone is neutral and objective; no significant sensationalism detected"
    }
}

/// Tone analyzer module (local, no I/O)
#[derive(Debug, Default, Clone)]
pub struct ToneAnalyzer;

impl ToneAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn assess(&self, text: &str) -> Result<Assessment, ModuleError> {
        let scores = score_text(text);
        let percent = scores.sensationalism() * 100.0;

        let words = text.split_whitespace().count();
        let confidence = match words {
            0..=4 => 0.5,
            5..=14 => 0.7,
            _ => 0.85,
        };

        Ok(Assessment::new(
            percent,
            confidence,
            format!(
                "{} (sensationalism {:.0}%, valence {:+.2})",
                rationale_for(percent),
                percent,
                scores.compound
            ),
        ))
    }
}

#[async_trait]
impl SignalModule for ToneAnalyzer {
    fn id(&self) -> &str {
        TONE_MODULE_ID
    }

    fn requires(&self) -> &[RequestField] {
        REQUIRES
    }

    async fn analyze(&self, request: &AnalysisRequest, deadline: Instant) -> SignalResult {
        guarded(TONE_MODULE_ID, REQUIRES, request, deadline, async {
            self.assess(request.text().unwrap_or_default())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credence_core::SignalStatus;
    use std::time::Duration;

    const SENSATIONAL: &str =
        "SHOCKING NEW VIDEO shows government cover-up of alien contact! MUST WATCH!";
    const NEUTRAL: &str = "The committee released its quarterly economic report, noting a 3% growth in regional consumer spending.";

    #[test]
    fn test_sensational_claim_scores_high() {
        let scores = score_text(SENSATIONAL);
        assert!(scores.clickbait >= 0.7);
        assert!(scores.shouting > 0.3);
        assert!(scores.sensationalism() > 0.5);
    }

    #[test]
    fn test_neutral_report_scores_low() {
        let scores = score_text(NEUTRAL);
        assert!(scores.compound.abs() < 0.5, "compound was {}", scores.compound);
        assert_eq!(scores.clickbait, 0.0);
        assert_eq!(scores.shouting, 0.0);
        assert!(scores.sensationalism() < 0.5);
    }

    #[test]
    fn test_sensationalism_is_symmetric_in_valence() {
        let positive = ToneScores { compound: 0.9, clickbait: 0.0, shouting: 0.0 };
        let negative = ToneScores { compound: -0.9, clickbait: 0.0, shouting: 0.0 };
        assert_eq!(positive.sensationalism(), negative.sensationalism());

        let shouted = ToneScores { compound: 0.2, clickbait: 0.0, shouting: 1.0 };
        assert!((shouted.sensationalism() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_negation_flips_valence() {
        assert!(score_text("The results were good").compound > 0.0);
        assert!(score_text("The results were not good").compound < 0.0);
    }

    #[test]
    fn test_boosters_and_caps_amplify() {
        let plain = score_text("a terrible decision").compound;
        let boosted = score_text("a very terrible decision").compound;
        let shouted = score_text("a TERRIBLE decision").compound;
        assert!(boosted < plain);
        assert!(shouted < plain);
    }

    #[test]
    fn test_rationale_bands() {
        assert!(rationale_for(85.0).contains("extremely"));
        assert!(rationale_for(60.0).contains("strongly"));
        assert!(rationale_for(30.0).contains("mild"));
        assert!(rationale_for(5.0).contains("neutral"));
    }

    #[tokio::test]
    async fn test_analyze_reports_percent() {
        let request = AnalysisRequest::builder().text(SENSATIONAL).build().unwrap();
        let result = ToneAnalyzer::new()
            .analyze(&request, Instant::now() + Duration::from_millis(500))
            .await;

        assert_eq!(result.status, SignalStatus::Success);
        let raw = result.raw_score.unwrap();
        assert!(raw > 50.0 && raw <= 100.0);
    }

    #[tokio::test]
    async fn test_analyze_skips_without_text() {
        let request = AnalysisRequest::builder()
            .source_url("https://example.com/story")
            .build()
            .unwrap();
        let result = ToneAnalyzer::new()
            .analyze(&request, Instant::now() + Duration::from_millis(500))
            .await;

        assert_eq!(result.status, SignalStatus::Skipped);
    }
}
