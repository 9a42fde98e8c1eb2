//! Unlock protocol
//!
//! Validates a submitted chapter password and advances the visitor's
//! watermark. Order of checks:
//!
//! 1. Rate limit for the client key
//! 2. Presence of id and password
//! 3. Catalogue lookup
//! 4. Already-unlocked short circuit (no password comparison)
//! 5. Constant-time password comparison
//! 6. Monotonic watermark advance

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::auth::{PasswordDeriver, RateLimiter};
use crate::catalogue::ChapterRegistry;
use crate::types::Watermark;

use super::state::UnlockState;

/// Body of an unlock request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnlockRequest {
    /// Chapter id or path
    #[serde(default, alias = "id")]
    pub slug: Option<String>,
    /// Supplied password
    #[serde(default)]
    pub password: Option<String>,
}

impl UnlockRequest {
    pub fn new(slug: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            password: Some(password.into()),
        }
    }
}

/// Which input of a malformed request was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    MissingId,
    MissingPassword,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::MissingId => write!(f, "Invalid slug"),
            MalformedReason::MissingPassword => write!(f, "Password is required"),
        }
    }
}

/// Result of an unlock attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Password accepted; watermark now covers the chapter
    Unlocked { watermark: Watermark },
    /// Chapter was already covered; nothing checked or changed
    AlreadyUnlocked { watermark: Watermark },
    /// Wrong password
    InvalidPassword,
    /// Client exceeded the attempt limit
    TooManyAttempts,
    /// Missing id or password
    MalformedRequest { reason: MalformedReason },
    /// Id is not in the catalogue; there is nothing to unlock
    NotAControlledResource,
}

impl UnlockOutcome {
    /// Unlocked and AlreadyUnlocked are successes
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            UnlockOutcome::Unlocked { .. } | UnlockOutcome::AlreadyUnlocked { .. }
        )
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            UnlockOutcome::Unlocked { .. } => "unlocked",
            UnlockOutcome::AlreadyUnlocked { .. } => "already_unlocked",
            UnlockOutcome::InvalidPassword => "invalid_password",
            UnlockOutcome::TooManyAttempts => "too_many_attempts",
            UnlockOutcome::MalformedRequest { .. } => "malformed_request",
            UnlockOutcome::NotAControlledResource => "not_controlled",
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Entry point for unlock attempts
#[derive(Debug, Clone)]
pub struct UnlockService {
    registry: Arc<ChapterRegistry>,
    passwords: Arc<PasswordDeriver>,
    rate_limiter: Arc<RateLimiter>,
}

impl UnlockService {
    pub fn new(
        registry: Arc<ChapterRegistry>,
        passwords: Arc<PasswordDeriver>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            registry,
            passwords,
            rate_limiter,
        }
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Attempt to unlock a chapter for one visitor
    pub fn attempt_unlock(
        &self,
        client_key: &str,
        request: &UnlockRequest,
        state: &mut UnlockState,
    ) -> UnlockOutcome {
        self.attempt_unlock_at(client_key, request, state, Instant::now())
    }

    /// As `attempt_unlock`, with an explicit clock for the rate limiter
    pub fn attempt_unlock_at(
        &self,
        client_key: &str,
        request: &UnlockRequest,
        state: &mut UnlockState,
        now: Instant,
    ) -> UnlockOutcome {
        let outcome = self.decide(client_key, request, state, now);

        let slug = request.slug.as_deref().unwrap_or("");
        let password_len = request.password.as_deref().map_or(0, str::len);
        match &outcome {
            UnlockOutcome::Unlocked { watermark } => info!(
                client = %client_key,
                slug = %slug,
                watermark = %watermark,
                "Chapter unlocked"
            ),
            UnlockOutcome::InvalidPassword | UnlockOutcome::TooManyAttempts => warn!(
                client = %client_key,
                slug = %slug,
                password_len,
                outcome = outcome.label(),
                "Unlock rejected"
            ),
            other => info!(
                client = %client_key,
                slug = %slug,
                password_len,
                outcome = other.label(),
                "Unlock attempt"
            ),
        }

        outcome
    }

    fn decide(
        &self,
        client_key: &str,
        request: &UnlockRequest,
        state: &mut UnlockState,
        now: Instant,
    ) -> UnlockOutcome {
        if !self.rate_limiter.check_and_record_at(client_key, now) {
            return UnlockOutcome::TooManyAttempts;
        }

        let Some(slug) = non_empty(&request.slug) else {
            return UnlockOutcome::MalformedRequest {
                reason: MalformedReason::MissingId,
            };
        };
        let Some(password) = request.password.as_deref().filter(|p| !p.is_empty()) else {
            return UnlockOutcome::MalformedRequest {
                reason: MalformedReason::MissingPassword,
            };
        };

        let Some(position) = self.registry.resolve_position(slug) else {
            return UnlockOutcome::NotAControlledResource;
        };

        let current = state.watermark();
        if current.covers(position) {
            return UnlockOutcome::AlreadyUnlocked { watermark: current };
        }

        if !self.passwords.verify(position, password) {
            return UnlockOutcome::InvalidPassword;
        }

        UnlockOutcome::Unlocked {
            watermark: state.advance_to(position),
        }
    }
}
