//! Credence Core - Request, signal and fusion model for credibility scoring
//!
//! This crate provides the foundational primitives:
//! - Analysis requests (claim text, source URL, media reference)
//! - Per-module signal results with a four-state status taxonomy
//! - Score normalizers expressed as configuration data
//! - Module specs and the fusion aggregator that combines them
//! - Corroboration search engine registry

pub mod request;
pub mod signals;
pub mod normalizer;
pub mod spec;
pub mod fusion;
pub mod report;
pub mod search_engines;

pub use request::*;
pub use signals::*;
pub use normalizer::*;
pub use spec::*;
pub use fusion::*;
pub use report::*;
pub use search_engines::*;

/// Minimum canonical risk score
pub const MIN_RISK: f64 = 0.0;

/// Maximum canonical risk score
pub const MAX_RISK: f64 = 1.0;

/// Default per-module timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
