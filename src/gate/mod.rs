//! Request gate
//!
//! Runs once per inbound content request:
//!
//! 0. The path is canonicalized; undecodable paths are rejected
//! 1. Exempt paths (unlock flow, static assets, site root) pass through
//! 2. Paths outside the content prefix pass through
//! 3. Content paths resolve to a chapter; unknown ids pass through
//! 4. Chapters above the visitor's watermark redirect to the unlock page,
//!    carrying the requested path as `next`

pub mod path;

pub use path::CanonicalPath;

use std::sync::Arc;
use tracing::debug;

use crate::auth::is_visible;
use crate::catalogue::{ChapterRegistry, CONTENT_PREFIX};
use crate::types::Watermark;

/// Gate configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Path prefixes that bypass the gate
    pub exempt_prefixes: Vec<String>,
    /// Prefix under which gated chapters live
    pub content_prefix: String,
    /// Unlock page that locked requests are redirected to
    pub unlock_path: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            exempt_prefixes: [
                "/unlock",
                "/api/unlock",
                "/_next",
                "/static",
                "/images",
                "/og",
                "/favicon.ico",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            content_prefix: CONTENT_PREFIX.to_string(),
            unlock_path: "/unlock".to_string(),
        }
    }
}

/// What to do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect { location: String },
    /// Path cannot be canonicalized
    Reject,
}

/// Server-side enforcement of chapter visibility
#[derive(Debug, Clone)]
pub struct RequestGate {
    registry: Arc<ChapterRegistry>,
    config: GateConfig,
}

impl RequestGate {
    pub fn new(registry: Arc<ChapterRegistry>, config: GateConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether `path` bypasses the gate entirely
    pub fn is_exempt(&self, path: &str) -> bool {
        path == "/"
            || self
                .config
                .exempt_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn is_content_path(&self, path: &str) -> bool {
        let prefix = self.config.content_prefix.as_str();
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Decide a request for the raw request `path` from a visitor at `watermark`
    pub fn evaluate(&self, path: &str, watermark: Watermark) -> GateDecision {
        match CanonicalPath::parse(path) {
            Some(canonical) => self.evaluate_canonical(&canonical, watermark),
            None => GateDecision::Reject,
        }
    }

    /// Decide a request whose path is already canonical
    pub fn evaluate_canonical(&self, path: &CanonicalPath, watermark: Watermark) -> GateDecision {
        let path = path.as_str();
        if self.is_exempt(path) || !self.is_content_path(path) {
            return GateDecision::Allow;
        }

        let position = self.registry.resolve_position(path);
        if is_visible(position, watermark) {
            return GateDecision::Allow;
        }

        debug!(path = %path, watermark = %watermark, "Chapter locked, redirecting");
        GateDecision::Redirect {
            location: self.unlock_location(path),
        }
    }

    /// Unlock page URL that returns to `path` afterwards
    pub fn unlock_location(&self, path: &str) -> String {
        format!(
            "{}?next={}",
            self.config.unlock_path,
            urlencoding::encode(path)
        )
    }
}
