//! Shared types

pub mod error;
pub mod watermark;

pub use error::{GateError, Result};
pub use watermark::{Position, Watermark};
