//! Credence runtime
//!
//! Wires signal modules into an evaluable engine:
//! - Module registry with copy-on-write snapshots
//! - Orchestrator that fans a request out under per-module deadlines
//! - Fusion engine, the single `evaluate` entry point

pub mod registry;
pub mod orchestrator;
pub mod engine;
pub mod assembly;

pub use registry::*;
pub use orchestrator::*;
pub use engine::*;
pub use assembly::*;
