//! Module specs
//!
//! A spec is the registry's view of one signal module: how much it counts,
//! how long it may run, and how its raw scale maps onto canonical risk.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::{Normalizer, DEFAULT_TIMEOUT_MS};

/// Errors from registry administration
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Module already registered: {0}")]
    DuplicateModule(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Invalid spec for {module_id}: {reason}")]
    InvalidSpec { module_id: String, reason: String },
}

/// Registry entry describing one signal module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Stable identifier, unique within a registry
    pub module_id: String,
    /// Relative importance; 0 disables the module
    pub weight: f64,
    /// Per-invocation time budget
    pub timeout_ms: u64,
    /// Raw scale to canonical risk mapping
    #[serde(default)]
    pub normalizer: Normalizer,
}

impl ModuleSpec {
    pub fn new(module_id: impl Into<String>, weight: f64) -> Self {
        Self {
            module_id: module_id.into(),
            weight,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            normalizer: Normalizer::Identity,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Weight 0 means the module is registered but inactive
    pub fn is_active(&self) -> bool {
        self.weight > 0.0
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidSpec {
            module_id: self.module_id.clone(),
            reason,
        };

        if self.module_id.trim().is_empty() {
            return Err(invalid("empty module id".to_string()));
        }
        validate_weight(&self.module_id, self.weight)?;
        if self.timeout_ms == 0 {
            return Err(invalid("timeout must be positive".to_string()));
        }
        self.normalizer.validate().map_err(invalid)
    }
}

/// Weights must be finite and non-negative
pub fn validate_weight(module_id: &str, weight: f64) -> Result<(), RegistryError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(RegistryError::InvalidSpec {
            module_id: module_id.to_string(),
            reason: format!("weight must be finite and >= 0, got {}", weight),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = ModuleSpec::new("tone", 0.2)
            .with_timeout_ms(500)
            .with_normalizer(Normalizer::Linear { min: 0.0, max: 100.0 });

        assert_eq!(spec.timeout(), Duration::from_millis(500));
        assert!(spec.is_active());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_zero_weight_is_inactive_but_valid() {
        let spec = ModuleSpec::new("media_integrity", 0.0);
        assert!(!spec.is_active());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_invalid_specs() {
        assert!(ModuleSpec::new("tone", -1.0).validate().is_err());
        assert!(ModuleSpec::new("tone", f64::NAN).validate().is_err());
        assert!(ModuleSpec::new("  ", 1.0).validate().is_err());
        assert!(ModuleSpec::new("tone", 1.0).with_timeout_ms(0).validate().is_err());
    }
}
