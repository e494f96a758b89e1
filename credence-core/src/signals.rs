//! Per-module signal results
//!
//! A signal result is what exactly one module produced for exactly one
//! request during one dispatch:
//! - A module-native raw score (only on success)
//! - The module's self-reported confidence
//! - A human-readable rationale
//! - A terminal status (success, failed, timed out, skipped)

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::RequestField;

/// Terminal state of one module invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Success,
    Failed,
    TimedOut,
    Skipped,
}

impl SignalStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SignalStatus::Success)
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalStatus::Success => write!(f, "success"),
            SignalStatus::Failed => write!(f, "failed"),
            SignalStatus::TimedOut => write!(f, "timed out"),
            SignalStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one signal module for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalResult {
    /// Stable module identifier
    pub module_id: String,

    /// Module-native risk reading; `None` unless status is success
    pub raw_score: Option<f64>,

    /// Module's certainty (0.0 - 1.0)
    pub confidence: f64,

    /// Why the module scored (or failed to score) the way it did
    pub rationale: String,

    /// Terminal status
    pub status: SignalStatus,

    /// Wall time spent in the module, in milliseconds
    pub elapsed_ms: u64,
}

impl SignalResult {
    /// A successful reading on the module's native scale
    pub fn success(
        module_id: impl Into<String>,
        raw_score: f64,
        confidence: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            raw_score: Some(raw_score),
            confidence: clamp_unit(confidence),
            rationale: rationale.into(),
            status: SignalStatus::Success,
            elapsed_ms: 0,
        }
    }

    /// The module ran but could not produce a score
    pub fn failed(module_id: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self::without_score(module_id, SignalStatus::Failed, rationale.into())
    }

    /// The module did not finish before its deadline
    pub fn timed_out(module_id: impl Into<String>, after: Duration) -> Self {
        Self::without_score(
            module_id,
            SignalStatus::TimedOut,
            format!("No result within {} ms", after.as_millis()),
        )
    }

    /// The request lacks fields the module needs
    pub fn skipped(module_id: impl Into<String>, missing: &[RequestField]) -> Self {
        let fields = missing
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self::without_score(
            module_id,
            SignalStatus::Skipped,
            format!("Request has no {}", fields),
        )
    }

    fn without_score(module_id: impl Into<String>, status: SignalStatus, rationale: String) -> Self {
        Self {
            module_id: module_id.into(),
            raw_score: None,
            confidence: 0.0,
            rationale,
            status,
            elapsed_ms: 0,
        }
    }

    /// Record how long the module took
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
