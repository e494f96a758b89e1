//! Score normalizers
//!
//! Every module reports on its own native scale (a percentage, a count of
//! corroborating domains, a credibility in [0,1], ...). A normalizer maps
//! that scale onto the canonical risk scale: 0.0 = credible, 1.0 = likely
//! misinformation. Normalizers are plain data so they can live in the
//! module catalog next to weights and timeouts.

use serde::{Deserialize, Serialize};

use crate::{MAX_RISK, MIN_RISK};

/// Mapping from a module's raw scale to canonical risk in [0,1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalizer {
    /// Raw score is already risk in [0,1]
    #[default]
    Identity,
    /// `min` maps to 0, `max` maps to 1
    Linear { min: f64, max: f64 },
    /// `min` maps to 1, `max` maps to 0 (raw score measures credibility)
    Inverted { min: f64, max: f64 },
    /// Logistic curve: 1 / (1 + e^(-k(x - midpoint)))
    Logistic { midpoint: f64, steepness: f64 },
    /// Linear interpolation over `(raw, risk)` points, flat beyond the ends
    Piecewise { points: Vec<(f64, f64)> },
}

impl Normalizer {
    /// Map a raw score onto [0,1]. Out-of-range output is clamped, never an error.
    pub fn apply(&self, raw: f64) -> f64 {
        let value = match self {
            Normalizer::Identity => raw,
            Normalizer::Linear { min, max } => linear(raw, *min, *max),
            Normalizer::Inverted { min, max } => 1.0 - linear(raw, *min, *max),
            Normalizer::Logistic { midpoint, steepness } => {
                1.0 / (1.0 + (-steepness * (raw - midpoint)).exp())
            }
            Normalizer::Piecewise { points } => piecewise(raw, points),
        };

        if value.is_nan() {
            value
        } else {
            value.clamp(MIN_RISK, MAX_RISK)
        }
    }

    /// Check that all parameters are usable
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Normalizer::Identity => Ok(()),
            Normalizer::Linear { min, max } | Normalizer::Inverted { min, max } => {
                if min.is_finite() && max.is_finite() {
                    Ok(())
                } else {
                    Err(format!("non-finite range [{}, {}]", min, max))
                }
            }
            Normalizer::Logistic { midpoint, steepness } => {
                if midpoint.is_finite() && steepness.is_finite() {
                    Ok(())
                } else {
                    Err("non-finite logistic parameters".to_string())
                }
            }
            Normalizer::Piecewise { points } => {
                if points.is_empty() {
                    return Err("piecewise normalizer needs at least one point".to_string());
                }
                if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                    return Err("non-finite piecewise point".to_string());
                }
                Ok(())
            }
        }
    }

    /// Short human-readable description
    pub fn describe(&self) -> String {
        match self {
            Normalizer::Identity => "identity".to_string(),
            Normalizer::Linear { min, max } => format!("linear [{}, {}]", min, max),
            Normalizer::Inverted { min, max } => format!("inverted [{}, {}]", min, max),
            Normalizer::Logistic { midpoint, steepness } => {
                format!("logistic (mid {}, k {})", midpoint, steepness)
            }
            Normalizer::Piecewise { points } => format!("piecewise ({} points)", points.len()),
        }
    }
}

fn linear(raw: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span == 0.0 {
        // Degenerate range: step at `min`
        return if raw >= min { 1.0 } else { 0.0 };
    }
    (raw - min) / span
}

fn piecewise(raw: f64, points: &[(f64, f64)]) -> f64 {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return f64::NAN,
    };

    if raw.is_nan() {
        return f64::NAN;
    }
    if raw <= first.0 {
        return first.1;
    }
    if raw >= last.0 {
        return last.1;
    }

    for pair in sorted.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if raw >= x0 && raw <= x1 {
            if x1 == x0 {
                return y1;
            }
            return y0 + (raw - x0) / (x1 - x0) * (y1 - y0);
        }
    }

    last.1
}
