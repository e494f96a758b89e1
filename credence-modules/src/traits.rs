//! Common traits for signal modules

use async_trait::async_trait;
use credence_core::{AnalysisRequest, RequestField, SignalResult};
use credence_net::NetError;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Errors raised inside a module. Never crosses the module boundary:
/// `guarded` turns every variant into a `Failed` result.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{service} returned HTTP {status}")]
    Upstream { service: String, status: u16 },

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<NetError> for ModuleError {
    fn from(e: NetError) -> Self {
        match e {
            NetError::RateLimited(service) => ModuleError::RateLimited(service),
            NetError::Status { url, status } => ModuleError::Upstream { service: url, status },
            other => ModuleError::Network(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ModuleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ModuleError::Parse(e.to_string())
        } else {
            ModuleError::Network(e.to_string())
        }
    }
}

/// What a module's internals produce on success
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Reading on the module's native scale
    pub raw_score: f64,
    pub confidence: f64,
    pub rationale: String,
}

impl Assessment {
    pub fn new(raw_score: f64, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            raw_score,
            confidence,
            rationale: rationale.into(),
        }
    }
}

/// Common interface for all signal modules
#[async_trait]
pub trait SignalModule: Send + Sync {
    /// Stable identifier, used as the registry key
    fn id(&self) -> &str;

    /// Request fields this module cannot work without
    fn requires(&self) -> &[RequestField];

    /// Analyze one request. Always returns a terminal result; faults are
    /// reported as `Failed`, an elapsed deadline as `TimedOut`.
    async fn analyze(&self, request: &AnalysisRequest, deadline: Instant) -> SignalResult;
}

/// Thread-safe reference to a signal module
pub type SharedModule = Arc<dyn SignalModule>;

/// Run a module's work under the module contract:
/// missing fields skip without polling `work`, the deadline bounds it,
/// and errors become `Failed` results.
pub async fn guarded<F>(
    module_id: &str,
    requires: &[RequestField],
    request: &AnalysisRequest,
    deadline: Instant,
    work: F,
) -> SignalResult
where
    F: Future<Output = Result<Assessment, ModuleError>>,
{
    let missing = request.missing(requires);
    if !missing.is_empty() {
        debug!(module = module_id, ?missing, "Skipping, required fields absent");
        return SignalResult::skipped(module_id, &missing);
    }

    let started = Instant::now();
    let budget = deadline.saturating_duration_since(started);

    let result = match tokio::time::timeout_at(deadline, work).await {
        Ok(Ok(assessment)) => SignalResult::success(
            module_id,
            assessment.raw_score,
            assessment.confidence,
            assessment.rationale,
        ),
        Ok(Err(e)) => {
            warn!(module = module_id, request = %request.id(), error = %e, "Module failed");
            SignalResult::failed(module_id, e.to_string())
        }
        Err(_) => {
            warn!(module = module_id, request = %request.id(), "Module missed its deadline");
            SignalResult::timed_out(module_id, budget)
        }
    };

    result.with_elapsed(started.elapsed())
}
