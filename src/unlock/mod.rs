//! Progressive chapter unlocking
//!
//! A visitor's access is a single watermark. Supplying the right password
//! for a chapter raises the watermark to that chapter's position, which
//! unlocks it and every chapter before it.

pub mod service;
pub mod state;

pub use service::{MalformedReason, UnlockOutcome, UnlockRequest, UnlockService};
pub use state::UnlockState;
