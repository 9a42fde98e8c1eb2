//! Chapter catalogue
//!
//! Provides:
//! - The ordered chapter registry and id normalization
//! - The built-in workshop catalogue
//! - JSON catalogue loading for other deployments

pub mod registry;
pub mod workshop;

pub use registry::{normalize_id, Chapter, ChapterRegistry, CONTENT_PREFIX};
pub use workshop::WORKSHOP_CHAPTERS;
