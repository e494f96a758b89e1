//! Credence signal modules
//!
//! Independent analysis modules that each turn one aspect of a content item
//! into a scored signal:
//! - **tone**: sensationalism of the claim's wording
//! - **visual_context**: whether the media supports the claim's framing
//! - **source_reputation**: credibility of the publishing domain
//! - **corroboration**: independent coverage of the claim on the web
//! - **media_integrity**: likelihood the media is manipulated
//!
//! Every module runs under `guarded`, so faults and deadlines surface as
//! result statuses rather than errors.

pub mod traits;
pub mod backend;
pub mod catalog;
pub mod tone;
pub mod visual;
pub mod reputation;
pub mod corroboration;
pub mod integrity;

pub use traits::*;
pub use backend::*;
pub use catalog::*;
pub use tone::*;
pub use visual::*;
pub use reputation::*;
pub use corroboration::*;
pub use integrity::*;
