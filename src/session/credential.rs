//! Signed credential carrying a visitor's watermark
//!
//! The unlock core only needs `encode(watermark)` and `decode(token)`. The
//! default codec signs an HS256 JWT with the session secret; the token is
//! tamper-evident and expires after the configured session lifetime.
//!
//! Security notes:
//! - The secret must be at least 32 characters outside dev mode
//! - Invalid, tampered or expired tokens decode to `None`, never an error

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::types::{GateError, Result, Watermark};

/// Minimum session secret length
pub const MIN_SECRET_LEN: usize = 32;

/// Encode/decode capability supplied by the session layer
pub trait CredentialCodec: Send + Sync {
    /// Issue a credential for `watermark`
    fn encode(&self, watermark: Watermark) -> Result<String>;

    /// Recover the watermark from a credential, if it is valid
    fn decode(&self, credential: &str) -> Option<Watermark>;
}

/// Payload stored in the credential
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnlockClaims {
    /// Watermark
    wm: i64,
    /// Issued at (Unix timestamp)
    iat: u64,
    /// Expiration time (Unix timestamp)
    exp: u64,
}

/// HS256 JWT credential codec
#[derive(Clone)]
pub struct JwtCredentialCodec {
    secret: String,
    max_age_secs: u64,
}

impl JwtCredentialCodec {
    /// Create a codec, rejecting empty or short secrets
    pub fn new(secret: String, max_age_secs: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(GateError::Config(
                "WORKSHOP_SESSION_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(GateError::Config(format!(
                "WORKSHOP_SESSION_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            secret,
            max_age_secs,
        })
    }

    /// Codec for dev mode with a fixed, public secret
    pub fn new_dev(max_age_secs: u64) -> Self {
        Self {
            secret: "dev-mode-session-secret-not-for-production".into(),
            max_age_secs,
        }
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    fn encode_with_times(&self, watermark: Watermark, iat: u64, exp: u64) -> Result<String> {
        let claims = UnlockClaims {
            wm: watermark.value(),
            iat,
            exp,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| GateError::Credential(format!("Failed to sign credential: {}", e)))
    }
}

impl CredentialCodec for JwtCredentialCodec {
    fn encode(&self, watermark: Watermark) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GateError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        self.encode_with_times(watermark, now, now + self.max_age_secs)
    }

    fn decode(&self, credential: &str) -> Option<Watermark> {
        match decode::<UnlockClaims>(
            credential,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => Some(Watermark::new(data.claims.wm)),
            Err(err) => {
                debug!(error = %err, "Discarding invalid credential");
                None
            }
        }
    }
}
