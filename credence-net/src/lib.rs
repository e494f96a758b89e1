//! Credence network layer
//!
//! Shared HTTP plumbing for signal modules:
//! - Client construction with timeouts, optional proxy and rotating user agents
//! - Fetching with bounded retries
//! - HTML search engine crawling for corroboration

pub mod client;
pub mod search;

pub use client::*;
pub use search::*;
