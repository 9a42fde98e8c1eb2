//! Authorization primitives for gated chapters
//!
//! Provides:
//! - Chapter password derivation and constant-time verification
//! - The visibility decision shared by the gate and renderers
//! - Per-client rate limiting for unlock attempts

pub mod access;
pub mod password;
pub mod rate_limit;

pub use access::{is_visible, AccessPolicy, ChapterStatus};
pub use password::{
    constant_time_eq, derive_password, PasswordDeriver, PasswordOverrides, PasswordSource,
    RosterEntry,
};
pub use rate_limit::{spawn_cleanup_task, RateLimitConfig, RateLimiter};
