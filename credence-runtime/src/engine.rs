//! Fusion Engine
//!
//! The single entry point a presentation layer calls. One evaluation is
//! snapshot, dispatch, fuse, all against the same registry snapshot, so an
//! administrator reweighting mid-flight never changes a run in progress.

use credence_core::{fuse, AnalysisRequest, FusionFailure, FusionResult, ModuleSpec, RegistryError};
use credence_modules::SharedModule;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use crate::{ModuleRegistry, Orchestrator};

/// Credibility fusion engine
#[derive(Debug, Clone)]
pub struct FusionEngine {
    registry: Arc<ModuleRegistry>,
    orchestrator: Orchestrator,
}

impl FusionEngine {
    /// Create an engine over an existing registry
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            registry,
            orchestrator: Orchestrator::new(),
        }
    }

    /// Shared handle to the underlying registry
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Score one request
    pub async fn evaluate(&self, request: &AnalysisRequest) -> Result<FusionResult, FusionFailure> {
        let request_id = request.id();
        let span = info_span!(
            "evaluate",
            request = %request_id,
            fingerprint = %request.fingerprint()
        );

        async move {
            let snapshot = self.registry.snapshot();
            info!(
                version = snapshot.version(),
                active = snapshot.active().count(),
                "Evaluating request"
            );

            let results = self
                .orchestrator
                .dispatch(&snapshot, Arc::new(request.clone()))
                .await;

            match fuse(results, &snapshot.specs()) {
                Ok(fused) => {
                    let fused = fused.with_request_id(request_id);
                    info!(
                        risk = fused.overall_score,
                        verdict = fused.verdict.label(),
                        degraded = fused.degraded,
                        "Evaluation complete"
                    );
                    Ok(fused)
                }
                Err(failure) => {
                    warn!(error = %failure, "Item is unassessable");
                    Err(failure)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Add a module to the registry
    pub fn register_module(&self, spec: ModuleSpec, module: SharedModule) -> Result<(), RegistryError> {
        self.registry.register(spec, module)
    }

    /// Remove a module from the registry
    pub fn unregister_module(&self, module_id: &str) -> Result<(), RegistryError> {
        self.registry.unregister(module_id)
    }

    /// Change a module's weight; 0 disables it
    pub fn set_module_weight(&self, module_id: &str, weight: f64) -> Result<(), RegistryError> {
        self.registry.set_weight(module_id, weight)
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(Arc::new(ModuleRegistry::new()))
    }
}
