//! Visitor sessions
//!
//! The watermark travels in a signed, HTTP-only cookie. Nothing is stored
//! server-side.

pub mod cookie;
pub mod credential;

pub use cookie::{cookie_value, SessionConfig, SessionManager, COOKIE_NAME, DEFAULT_MAX_AGE_SECS};
pub use credential::{CredentialCodec, JwtCredentialCodec, MIN_SECRET_LEN};
