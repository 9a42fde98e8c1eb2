//! chapter-gate - progressive password gate for workshop documentation
//!
//! Chapters of a workshop unlock one at a time. Each visitor carries a single
//! watermark in a signed cookie: every chapter at or below it is readable,
//! everything above it redirects to the unlock page until the organiser's
//! password for that chapter is supplied.
//!
//! ## Components
//!
//! - **Catalogue**: ordered chapter registry and id normalization
//! - **Auth**: password derivation, visibility decision, rate limiting
//! - **Unlock**: per-visitor state and the unlock protocol
//! - **Session**: signed credential cookie carrying the watermark
//! - **Gate**: per-request allow/redirect decision
//! - **Server**: hyper front end forwarding allowed requests upstream

pub mod auth;
pub mod catalogue;
pub mod config;
pub mod gate;
pub mod routes;
pub mod server;
pub mod session;
pub mod types;
pub mod unlock;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GateError, Result};
