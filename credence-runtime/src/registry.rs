//! Module registry
//!
//! Holds the registered signal modules with their specs. Writes are
//! serialized and copy-on-write: each one builds a new module list and swaps
//! it in, so a snapshot taken before a write never observes it.

use credence_core::{validate_weight, ModuleSpec, RegistryError};
use credence_modules::SharedModule;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// A module together with its registry spec
#[derive(Clone)]
pub struct RegisteredModule {
    pub spec: ModuleSpec,
    pub module: SharedModule,
}

impl std::fmt::Debug for RegisteredModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredModule")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Immutable view of the registry at one point in time
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    version: u64,
    modules: Arc<Vec<RegisteredModule>>,
}

impl RegistrySnapshot {
    /// Registry version this snapshot was taken at
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Modules in registration order
    pub fn modules(&self) -> &[RegisteredModule] {
        &self.modules
    }

    /// Specs in registration order
    pub fn specs(&self) -> Vec<ModuleSpec> {
        self.modules.iter().map(|m| m.spec.clone()).collect()
    }

    /// Modules with weight > 0
    pub fn active(&self) -> impl Iterator<Item = &RegisteredModule> {
        self.modules.iter().filter(|m| m.spec.is_active())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    version: u64,
    modules: Arc<Vec<RegisteredModule>>,
}

/// Registry of signal modules
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    state: RwLock<RegistryState>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under its spec
    pub fn register(&self, spec: ModuleSpec, module: SharedModule) -> Result<(), RegistryError> {
        spec.validate()?;
        if spec.module_id != module.id() {
            return Err(RegistryError::InvalidSpec {
                module_id: spec.module_id.clone(),
                reason: format!("module reports id {}", module.id()),
            });
        }

        let module_id = spec.module_id.clone();
        let weight = spec.weight;
        self.write(|modules| {
            if modules.iter().any(|m| m.spec.module_id == spec.module_id) {
                return Err(RegistryError::DuplicateModule(spec.module_id.clone()));
            }
            modules.push(RegisteredModule { spec, module });
            Ok(())
        })?;

        info!(module = %module_id, weight, "Module registered");
        Ok(())
    }

    /// Remove a module
    pub fn unregister(&self, module_id: &str) -> Result<(), RegistryError> {
        self.write(|modules| {
            let idx = position(modules, module_id)?;
            modules.remove(idx);
            Ok(())
        })?;

        info!(module = module_id, "Module unregistered");
        Ok(())
    }

    /// Change a module's weight; 0 disables it
    pub fn set_weight(&self, module_id: &str, weight: f64) -> Result<(), RegistryError> {
        validate_weight(module_id, weight)?;
        self.write(|modules| {
            let idx = position(modules, module_id)?;
            modules[idx].spec.weight = weight;
            Ok(())
        })?;

        info!(module = module_id, weight, "Module reweighted");
        Ok(())
    }

    /// Take an immutable snapshot for one dispatch
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read();
        RegistrySnapshot {
            version: state.version,
            modules: Arc::clone(&state.modules),
        }
    }

    /// Current specs in registration order
    pub fn specs(&self) -> Vec<ModuleSpec> {
        self.snapshot().specs()
    }

    pub fn len(&self) -> usize {
        self.state.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a mutation to a private copy and publish it if it succeeds
    fn write<F>(&self, mutate: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Vec<RegisteredModule>) -> Result<(), RegistryError>,
    {
        let mut state = self.state.write();
        let mut next = state.modules.as_ref().clone();
        mutate(&mut next)?;
        state.modules = Arc::new(next);
        state.version += 1;
        Ok(())
    }
}

fn position(modules: &[RegisteredModule], module_id: &str) -> Result<usize, RegistryError> {
    modules
        .iter()
        .position(|m| m.spec.module_id == module_id)
        .ok_or_else(|| RegistryError::UnknownModule(module_id.to_string()))
}
