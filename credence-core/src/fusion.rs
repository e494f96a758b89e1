//! Fusion aggregator
//!
//! Combines per-module signal results into one canonical risk score:
//! 1. Successful raw scores are normalized to [0,1] by their spec's normalizer
//! 2. Failed, timed out and skipped modules stay in the breakdown but not the sum
//! 3. Weights are renormalized over the modules that actually produced a score
//! 4. Zero surviving modules is a failure, never a default score

use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    Contribution, FusionResult, ModuleSpec, SignalResult, SignalStatus, Verdict, MAX_RISK, MIN_RISK,
};

/// Reasons an item cannot be assessed
#[derive(Debug, Clone, Error)]
pub enum FusionFailure {
    #[error("No active modules (registry empty or every weight is 0)")]
    NoActiveModules,

    #[error("Insufficient signal: none of {} modules produced a score", .breakdown.len())]
    NoSurvivingModules {
        /// Why each module was excluded
        breakdown: Vec<Contribution>,
    },
}

impl FusionFailure {
    /// Per-module explanation, when modules were dispatched
    pub fn breakdown(&self) -> &[Contribution] {
        match self {
            FusionFailure::NoActiveModules => &[],
            FusionFailure::NoSurvivingModules { breakdown } => breakdown,
        }
    }
}

/// Fuse signal results against the specs of the snapshot they were dispatched from.
///
/// `results` are consumed; breakdown order follows their order.
pub fn fuse(results: Vec<SignalResult>, specs: &[ModuleSpec]) -> Result<FusionResult, FusionFailure> {
    if !specs.iter().any(ModuleSpec::is_active) {
        return Err(FusionFailure::NoActiveModules);
    }

    let by_id: HashMap<&str, &ModuleSpec> =
        specs.iter().map(|s| (s.module_id.as_str(), s)).collect();

    let mut breakdown = Vec::with_capacity(results.len());
    let mut survivors: Vec<(usize, f64, f64)> = Vec::new(); // (row, weight, score)

    for result in results {
        let spec = match by_id.get(result.module_id.as_str()) {
            Some(spec) => *spec,
            None => {
                warn!(module = %result.module_id, "Result has no matching spec, ignored");
                continue;
            }
        };

        if !spec.is_active() {
            debug!(module = %result.module_id, "Inactive module result ignored");
            continue;
        }

        let mut row = Contribution {
            module_id: result.module_id,
            status: result.status,
            raw_score: result.raw_score,
            normalized_score: None,
            declared_weight: spec.weight,
            effective_weight: 0.0,
            confidence: result.confidence,
            rationale: result.rationale,
            elapsed_ms: result.elapsed_ms,
        };

        if let (SignalStatus::Success, Some(raw)) = (row.status, row.raw_score) {
            let normalized = spec.normalizer.apply(raw);
            if normalized.is_finite() {
                row.normalized_score = Some(normalized);
                survivors.push((breakdown.len(), spec.weight, normalized));
            } else {
                warn!(module = %row.module_id, raw, "Non-finite score excluded");
                row.status = SignalStatus::Failed;
                row.rationale = format!("non-finite score ({})", row.rationale);
            }
        } else if row.status == SignalStatus::Success {
            row.status = SignalStatus::Failed;
            row.rationale = format!("success reported without a score ({})", row.rationale);
        }

        breakdown.push(row);
    }

    // Weights are summed relative to the largest one so that huge finite
    // weights cannot overflow the total.
    let max_weight = survivors.iter().map(|(_, w, _)| *w).fold(0.0, f64::max);
    if survivors.is_empty() || max_weight <= 0.0 {
        return Err(FusionFailure::NoSurvivingModules { breakdown });
    }
    let total_weight: f64 = survivors.iter().map(|(_, w, _)| w / max_weight).sum();

    // Weighted mean taken relative to the lowest score, so a single survivor
    // or identical scores come back bit-for-bit.
    let anchor = survivors
        .iter()
        .map(|(_, _, s)| *s)
        .fold(f64::INFINITY, f64::min);

    let mut overall = anchor;
    for (row, weight, score) in &survivors {
        let effective = (weight / max_weight) / total_weight;
        breakdown[*row].effective_weight = effective;
        overall += effective * (score - anchor);
    }
    let overall = overall.clamp(MIN_RISK, MAX_RISK);

    let degraded = breakdown.iter().any(|c| c.status != SignalStatus::Success);

    debug!(
        overall,
        survivors = survivors.len(),
        modules = breakdown.len(),
        degraded,
        "Fusion complete"
    );

    Ok(FusionResult {
        request_id: None,
        overall_score: overall,
        verdict: Verdict::from_risk(overall),
        breakdown,
        degraded,
        timestamp: Utc::now(),
    })
}
