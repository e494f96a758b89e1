//! Runtime assembly
//!
//! Builds the stock signal modules and registers them in catalog order.

use anyhow::{bail, Context, Result};
use credence_modules::{
    BraveSearch, CorroborationChecker, CredibilityDb, EngineSearch, MediaIntegrityChecker,
    ModuleCatalog, SafeBrowsing, SharedModule, SharedVision, SourceReputationChecker, ThreatList,
    ToneAnalyzer, VisualContextChecker, WebSearch, CORROBORATION_MODULE_ID, INTEGRITY_MODULE_ID,
    REPUTATION_MODULE_ID, TONE_MODULE_ID, VISUAL_MODULE_ID,
};
use credence_net::{create_client, HttpConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ModuleRegistry;

/// Credentials and options for the stock modules
#[derive(Default)]
pub struct RuntimeConfig {
    /// Outbound HTTP settings shared by every module
    pub http: HttpConfig,
    /// Brave Search API key; without it corroboration scrapes HTML engines
    pub brave_api_key: Option<String>,
    /// Google Safe Browsing key; without it reputation is DB-only
    pub safebrowsing_api_key: Option<String>,
    /// Vision backend (pre-constructed) for visual context and media integrity
    pub vision: Option<SharedVision>,
    /// Extra reputation entries merged over the embedded database
    pub reputation_db: Option<PathBuf>,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("http", &self.http)
            .field("brave_api_key", &self.brave_api_key.as_ref().map(|_| "***"))
            .field("safebrowsing_api_key", &self.safebrowsing_api_key.as_ref().map(|_| "***"))
            .field("vision", &self.vision.as_ref().map(|v| v.model_name().to_string()))
            .field("reputation_db", &self.reputation_db)
            .finish()
    }
}

/// Build a registry holding every module the catalog lists
pub fn default_registry(catalog: &ModuleCatalog, config: RuntimeConfig) -> Result<ModuleRegistry> {
    let mut modules = stock_modules(config)?;
    let registry = ModuleRegistry::new();

    for entry in catalog.entries() {
        let module = match modules.remove(entry.id.as_str()) {
            Some(module) => module,
            None => bail!("Catalog lists unknown module '{}'", entry.id),
        };
        registry
            .register(entry.to_spec(), module)
            .with_context(|| format!("Failed to register module '{}'", entry.id))?;
    }

    for id in modules.keys() {
        debug!(module = *id, "Module not in catalog, left unregistered");
    }

    info!(
        "Registry ready with {} modules ({} active)",
        registry.len(),
        registry.snapshot().active().count()
    );
    Ok(registry)
}

fn stock_modules(config: RuntimeConfig) -> Result<HashMap<&'static str, SharedModule>> {
    let client = create_client(&config.http)?;

    let mut db = CredibilityDb::load_embedded()?;
    if let Some(path) = &config.reputation_db {
        db.merge(CredibilityDb::load_from_file(path)?);
    }

    let threats: Option<Arc<dyn ThreatList>> = config
        .safebrowsing_api_key
        .map(|key| Arc::new(SafeBrowsing::new(key, client.clone())) as Arc<dyn ThreatList>);

    let search: Arc<dyn WebSearch> = match config.brave_api_key {
        Some(key) => Arc::new(BraveSearch::new(key, client.clone())),
        None => Arc::new(EngineSearch::new(client.clone(), config.http.max_retries)),
    };
    info!("Corroboration searching via {}", search.name());

    if config.vision.is_none() {
        info!("No vision backend configured; media modules will report Failed");
    }

    let mut modules: HashMap<&'static str, SharedModule> = HashMap::new();
    modules.insert(TONE_MODULE_ID, Arc::new(ToneAnalyzer::new()));
    modules.insert(
        VISUAL_MODULE_ID,
        Arc::new(VisualContextChecker::new(config.vision.clone())),
    );
    modules.insert(
        REPUTATION_MODULE_ID,
        Arc::new(SourceReputationChecker::new(db, threats)),
    );
    modules.insert(CORROBORATION_MODULE_ID, Arc::new(CorroborationChecker::new(search)));
    modules.insert(
        INTEGRITY_MODULE_ID,
        Arc::new(MediaIntegrityChecker::new(config.vision)),
    );
    Ok(modules)
}
