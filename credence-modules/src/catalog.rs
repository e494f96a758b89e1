//! Module catalog
//!
//! Loads module weights, timeouts and normalizers from TOML so that the
//! fusion policy can be changed without touching code.

use credence_core::{ModuleSpec, Normalizer, RegistryError, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors loading catalogs and data files
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] RegistryError),
}

/// Read a file, keeping the path in the error
pub(crate) fn read_file(path: &Path) -> Result<String, CatalogError> {
    std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// One `[[module]]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub weight: f64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub normalizer: Normalizer,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl CatalogEntry {
    /// Registry spec for this entry; disabled entries get weight 0
    pub fn to_spec(&self) -> ModuleSpec {
        let weight = if self.enabled { self.weight } else { 0.0 };
        ModuleSpec::new(&self.id, weight)
            .with_timeout_ms(self.timeout_ms)
            .with_normalizer(self.normalizer.clone())
    }
}

/// Ordered set of module entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleCatalog {
    #[serde(rename = "module", default)]
    modules: Vec<CatalogEntry>,
}

impl ModuleCatalog {
    /// Load the default catalog shipped with the crate
    pub fn load_embedded() -> Result<Self, CatalogError> {
        Self::from_toml(include_str!("../data/modules.toml"))
    }

    /// Load a catalog from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        Self::from_toml(&read_file(path.as_ref())?)
    }

    /// Parse and validate a catalog
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let catalog: ModuleCatalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for entry in &self.modules {
            if !seen.insert(entry.id.as_str()) {
                return Err(RegistryError::DuplicateModule(entry.id.clone()));
            }
            entry.to_spec().validate()?;
            // weight is checked even when disabled
            credence_core::validate_weight(&entry.id, entry.weight)?;
        }
        Ok(())
    }

    /// Entries in catalog order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.modules
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.modules.iter().find(|e| e.id == id)
    }

    /// Spec for a module, if the catalog lists it
    pub fn spec_for(&self, id: &str) -> Option<ModuleSpec> {
        self.get(id).map(CatalogEntry::to_spec)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog_defaults() {
        let catalog = ModuleCatalog::load_embedded().unwrap();
        assert_eq!(catalog.len(), 5);

        let tone = catalog.spec_for("tone").unwrap();
        assert_eq!(tone.weight, 0.20);
        assert_eq!(tone.timeout_ms, 500);
        assert_eq!(tone.normalizer, Normalizer::Linear { min: 0.0, max: 100.0 });

        let corroboration = catalog.spec_for("corroboration").unwrap();
        assert_eq!(corroboration.normalizer.apply(0.0), 0.85);
        assert_eq!(corroboration.normalizer.apply(10.0), 0.1);

        let integrity = catalog.spec_for("media_integrity").unwrap();
        assert!(!integrity.is_active());
        assert!(!catalog.get("media_integrity").unwrap().enabled);
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let catalog = ModuleCatalog::from_toml(
            r#"
            [[module]]
            id = "tone"
            weight = 1.0
            "#,
        )
        .unwrap();

        let spec = catalog.spec_for("tone").unwrap();
        assert_eq!(spec.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(spec.normalizer, Normalizer::Identity);
        assert!(catalog.spec_for("corroboration").is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = ModuleCatalog::from_toml(
            r#"
            [[module]]
            id = "tone"
            weight = 1.0

            [[module]]
            id = "tone"
            weight = 2.0
            "#,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CatalogError::Invalid(RegistryError::DuplicateModule(_))
        ));
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let negative = ModuleCatalog::from_toml(
            r#"
            [[module]]
            id = "tone"
            weight = -0.5
            enabled = false
            "#,
        );
        assert!(matches!(negative, Err(CatalogError::Invalid(_))));

        let malformed = ModuleCatalog::from_toml("[[module]]\nid = 3");
        assert!(matches!(malformed, Err(CatalogError::Toml(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = ModuleCatalog::load_from_file("/nonexistent/credence/modules.toml").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
