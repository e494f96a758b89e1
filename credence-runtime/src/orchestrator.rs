//! Orchestrator
//!
//! Fans one request out to every active module of a registry snapshot:
//! - Weight 0 modules are never invoked and produce no result
//! - Modules missing required fields are answered `Skipped` inline
//! - Everything else runs as its own task under its own deadline
//!
//! A task still running at its deadline is aborted and recorded as
//! `TimedOut`. Dropping a dispatch aborts every task it started. Results
//! come back in registration order.

use credence_core::{AnalysisRequest, SignalResult};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::{RegisteredModule, RegistrySnapshot};

/// Concurrent module dispatcher
#[derive(Debug, Default, Clone)]
pub struct Orchestrator;

impl Orchestrator {
    pub fn new() -> Self {
        Self
    }

    /// Run every active module of the snapshot against the request
    pub async fn dispatch(
        &self,
        snapshot: &RegistrySnapshot,
        request: Arc<AnalysisRequest>,
    ) -> Vec<SignalResult> {
        let runs = snapshot
            .active()
            .map(|entry| run_module(entry.clone(), Arc::clone(&request)));

        let results = join_all(runs).await;

        debug!(
            request = %request.id(),
            version = snapshot.version(),
            dispatched = results.len(),
            "Dispatch complete"
        );

        results
    }
}

/// Module task that is aborted when dropped
struct TaskGuard(JoinHandle<SignalResult>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_module(entry: RegisteredModule, request: Arc<AnalysisRequest>) -> SignalResult {
    let module_id = entry.spec.module_id.clone();

    let missing = request.missing(entry.module.requires());
    if !missing.is_empty() {
        return SignalResult::skipped(&module_id, &missing);
    }

    let started = Instant::now();
    let deadline = started + entry.spec.timeout();
    let module = Arc::clone(&entry.module);
    let mut task = TaskGuard(tokio::spawn(async move {
        module.analyze(&request, deadline).await
    }));

    let result = match tokio::time::timeout_at(deadline, &mut task.0).await {
        Ok(Ok(mut result)) => {
            if result.module_id != module_id {
                warn!(
                    module = %module_id,
                    reported = %result.module_id,
                    "Module reported a foreign id; result reattributed"
                );
                result.module_id = module_id.clone();
            }
            result
        }
        Ok(Err(join_error)) if join_error.is_panic() => {
            error!(module = %module_id, "Module panicked");
            SignalResult::failed(&module_id, "Module panicked")
        }
        Ok(Err(join_error)) => {
            warn!(module = %module_id, error = %join_error, "Module task cancelled");
            SignalResult::failed(&module_id, "Module task cancelled")
        }
        Err(_) => {
            task.0.abort();
            warn!(module = %module_id, timeout_ms = entry.spec.timeout_ms, "Module abandoned at deadline");
            SignalResult::timed_out(&module_id, entry.spec.timeout())
        }
    };

    if result.elapsed_ms == 0 {
        result.with_elapsed(started.elapsed())
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModuleRegistry;
    use async_trait::async_trait;
    use credence_core::{ModuleSpec, RequestField, SignalStatus};
    use credence_modules::SignalModule;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps, then succeeds, without enforcing its own deadline
    struct SlowModule {
        id: &'static str,
        delay: Duration,
        calls: AtomicUsize,
        completed: AtomicUsize,
    }

    impl SlowModule {
        fn new(id: &'static str, delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                id,
                delay: Duration::from_millis(delay_ms),
                calls: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SignalModule for SlowModule {
        fn id(&self) -> &str {
            self.id
        }

        fn requires(&self) -> &[RequestField] {
            &[RequestField::Text]
        }

        async fn analyze(&self, _request: &AnalysisRequest, _deadline: Instant) -> SignalResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            SignalResult::success(self.id, 0.5, 1.0, "done")
        }
    }

    struct PanickingModule;

    #[async_trait]
    impl SignalModule for PanickingModule {
        fn id(&self) -> &str {
            "panics"
        }

        fn requires(&self) -> &[RequestField] {
            &[]
        }

        async fn analyze(&self, _request: &AnalysisRequest, _deadline: Instant) -> SignalResult {
            panic!("boom")
        }
    }

    fn text_request() -> Arc<AnalysisRequest> {
        Arc::new(AnalysisRequest::builder().text("claim").build().unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_in_registration_order() {
        let registry = ModuleRegistry::new();
        registry
            .register(ModuleSpec::new("slow", 1.0), SlowModule::new("slow", 300))
            .unwrap();
        registry
            .register(ModuleSpec::new("fast", 1.0), SlowModule::new("fast", 10))
            .unwrap();

        let results = Orchestrator::new()
            .dispatch(&registry.snapshot(), text_request())
            .await;

        let ids: Vec<_> = results.iter().map(|r| r.module_id.as_str()).collect();
        assert_eq!(ids, vec!["slow", "fast"]);
        assert!(results.iter().all(|r| r.status == SignalStatus::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_abandons_module() {
        let registry = ModuleRegistry::new();
        registry
            .register(
                ModuleSpec::new("stuck", 1.0).with_timeout_ms(100),
                SlowModule::new("stuck", 60_000),
            )
            .unwrap();
        registry
            .register(ModuleSpec::new("quick", 1.0), SlowModule::new("quick", 10))
            .unwrap();

        let started = Instant::now();
        let results = Orchestrator::new()
            .dispatch(&registry.snapshot(), text_request())
            .await;

        assert_eq!(results[0].status, SignalStatus::TimedOut);
        assert_eq!(results[0].rationale, "No result within 100 ms");
        assert_eq!(results[1].status, SignalStatus::Success);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_weight_never_invoked() {
        let disabled = SlowModule::new("disabled", 0);
        let registry = ModuleRegistry::new();
        registry
            .register(ModuleSpec::new("disabled", 0.0), disabled.clone())
            .unwrap();
        registry
            .register(ModuleSpec::new("enabled", 1.0), SlowModule::new("enabled", 0))
            .unwrap();

        let results = Orchestrator::new()
            .dispatch(&registry.snapshot(), text_request())
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].module_id, "enabled");
        assert_eq!(disabled.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_fields_skipped_without_invocation() {
        let module = SlowModule::new("needs_text", 0);
        let registry = ModuleRegistry::new();
        registry
            .register(ModuleSpec::new("needs_text", 1.0), module.clone())
            .unwrap();

        let request = Arc::new(AnalysisRequest::builder().media_ref("a.png").build().unwrap());
        let results = Orchestrator::new().dispatch(&registry.snapshot(), request).await;

        assert_eq!(results[0].status, SignalStatus::Skipped);
        assert_eq!(module.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let registry = ModuleRegistry::new();
        registry
            .register(ModuleSpec::new("panics", 1.0), Arc::new(PanickingModule))
            .unwrap();
        registry
            .register(ModuleSpec::new("fine", 1.0), SlowModule::new("fine", 0))
            .unwrap();

        let results = Orchestrator::new()
            .dispatch(&registry.snapshot(), text_request())
            .await;

        assert_eq!(results[0].status, SignalStatus::Failed);
        assert_eq!(results[0].rationale, "Module panicked");
        assert_eq!(results[1].status, SignalStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_dispatch_aborts_module_tasks() {
        let module = SlowModule::new("slow", 200);
        let registry = ModuleRegistry::new();
        registry
            .register(ModuleSpec::new("slow", 1.0), module.clone())
            .unwrap();

        let snapshot = registry.snapshot();
        let orchestrator = Orchestrator::new();
        let dispatch = orchestrator.dispatch(&snapshot, text_request());
        let outcome = tokio::time::timeout(Duration::from_millis(50), dispatch).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(module.calls.load(Ordering::SeqCst), 1);
        assert_eq!(module.completed.load(Ordering::SeqCst), 0);
    }
}
