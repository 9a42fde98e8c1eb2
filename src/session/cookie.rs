//! Unlock cookie handling
//!
//! Turns the `Cookie` request header into an `UnlockState` and an updated
//! state back into a `Set-Cookie` value.

use std::sync::Arc;

use super::credential::CredentialCodec;
use crate::types::{Result, Watermark};
use crate::unlock::UnlockState;

/// Cookie carrying the unlock credential
pub const COOKIE_NAME: &str = "ws_unlock";

/// Default credential lifetime: 7 days
pub const DEFAULT_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;

/// Session cookie configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age_secs: u64,
    /// Add the `Secure` attribute (off in dev mode)
    pub secure: bool,
    /// Watermark for first contact and after reset
    pub default_watermark: Watermark,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: COOKIE_NAME.to_string(),
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            secure: true,
            default_watermark: Watermark::FIRST_CHAPTER,
        }
    }
}

/// Find a cookie's value in a `Cookie` header
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
}

/// Loads and stores visitor state through the credential codec
#[derive(Clone)]
pub struct SessionManager {
    codec: Arc<dyn CredentialCodec>,
    config: SessionConfig,
    chapter_count: usize,
}

impl SessionManager {
    pub fn new(codec: Arc<dyn CredentialCodec>, config: SessionConfig, chapter_count: usize) -> Self {
        Self {
            codec,
            config,
            chapter_count,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Fresh state for a first-contact visitor
    pub fn default_state(&self) -> UnlockState {
        UnlockState::new(self.config.default_watermark)
    }

    /// Decode the visitor's state from the request `Cookie` header.
    ///
    /// A missing, invalid or expired credential yields the default state.
    /// Decoded watermarks are clamped to the catalogue.
    pub fn load(&self, cookie_header: Option<&str>) -> UnlockState {
        cookie_header
            .and_then(|header| cookie_value(header, &self.config.cookie_name))
            .and_then(|token| self.codec.decode(token))
            .map(|watermark| {
                UnlockState::new(
                    watermark.clamp_to(self.config.default_watermark, self.chapter_count),
                )
            })
            .unwrap_or_else(|| self.default_state())
    }

    /// `Set-Cookie` header value persisting `state`
    pub fn set_cookie(&self, state: &UnlockState) -> Result<String> {
        let token = self.codec.encode(state.watermark())?;
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.config.cookie_name, token, self.config.max_age_secs
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        Ok(cookie)
    }
}
