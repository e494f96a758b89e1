//! Fusion results
//!
//! The immutable, explainable output of one evaluation. Every row of the
//! breakdown says which module contributed, how much, and if it did not,
//! why not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SignalStatus;

/// Credibility band derived from the fused risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    HighlyCredible,
    MediumCredibility,
    LowCredibility,
    LikelyMisinformation,
}

impl Verdict {
    /// Band a canonical risk score (credibility = 1 - risk)
    pub fn from_risk(risk: f64) -> Self {
        let credibility = 1.0 - risk;
        if credibility >= 0.80 {
            Verdict::HighlyCredible
        } else if credibility >= 0.60 {
            Verdict::MediumCredibility
        } else if credibility >= 0.40 {
            Verdict::LowCredibility
        } else {
            Verdict::LikelyMisinformation
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::HighlyCredible => "Highly credible",
            Verdict::MediumCredibility => "Medium credibility (watchful)",
            Verdict::LowCredibility => "Low credibility (suspect)",
            Verdict::LikelyMisinformation => "High probability of misinformation",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the fusion breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub module_id: String,
    pub status: SignalStatus,
    /// Module-native reading, if the module succeeded
    pub raw_score: Option<f64>,
    /// Canonical risk in [0,1]; `None` for excluded modules
    pub normalized_score: Option<f64>,
    /// Weight declared in the registry snapshot
    pub declared_weight: f64,
    /// Share of the final score; 0 for excluded modules
    pub effective_weight: f64,
    pub confidence: f64,
    pub rationale: String,
    pub elapsed_ms: u64,
}

impl Contribution {
    /// Whether this row took part in the weighted sum
    pub fn contributed(&self) -> bool {
        self.normalized_score.is_some()
    }
}

/// Final output of one evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionResult {
    pub request_id: Option<Uuid>,
    /// Canonical risk in [0,1]
    pub overall_score: f64,
    pub verdict: Verdict,
    /// Per-module rows in registration order
    pub breakdown: Vec<Contribution>,
    /// True if any module did not succeed
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}

impl FusionResult {
    /// Credibility is the complement of risk
    pub fn credibility(&self) -> f64 {
        1.0 - self.overall_score
    }

    /// Rows that contributed to the score
    pub fn contributors(&self) -> impl Iterator<Item = &Contribution> {
        self.breakdown.iter().filter(|c| c.contributed())
    }

    /// Rows that were excluded, with their status
    pub fn excluded(&self) -> impl Iterator<Item = &Contribution> {
        self.breakdown.iter().filter(|c| !c.contributed())
    }

    pub fn contribution(&self, module_id: &str) -> Option<&Contribution> {
        self.breakdown.iter().find(|c| c.module_id == module_id)
    }

    pub fn with_request_id(mut self, id: Uuid) -> Self {
        self.request_id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_bands() {
        assert_eq!(Verdict::from_risk(0.1), Verdict::HighlyCredible);
        assert_eq!(Verdict::from_risk(0.15), Verdict::HighlyCredible);
        assert_eq!(Verdict::from_risk(0.3), Verdict::MediumCredibility);
        assert_eq!(Verdict::from_risk(0.5), Verdict::LowCredibility);
        assert_eq!(Verdict::from_risk(0.75), Verdict::LikelyMisinformation);
    }

    #[test]
    fn test_verdict_serializes_snake_case() {
        let json = serde_json::to_string(&Verdict::LikelyMisinformation).unwrap();
        assert_eq!(json, "\"likely_misinformation\"");
    }
}
