//! Configuration for chapter-gate
//!
//! CLI arguments and environment variables are parsed by clap once at
//! startup, then resolved into typed component configuration. Nothing reads
//! the environment after that.

use clap::Parser;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{PasswordOverrides, RateLimitConfig};
use crate::catalogue::ChapterRegistry;
use crate::session::{JwtCredentialCodec, SessionConfig, MIN_SECRET_LEN};
use crate::types::{GateError, Result, Watermark};

/// chapter-gate - progressive password gate for workshop docs
#[derive(Parser, Debug, Clone)]
#[command(name = "chapter-gate")]
#[command(about = "Password gate in front of a workshop documentation site")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Documentation site that allowed requests are forwarded to
    #[arg(long, env = "UPSTREAM_URL", default_value = "http://localhost:3000")]
    pub upstream_url: String,

    /// Secret used to sign unlock credentials (required in production)
    #[arg(long, env = "WORKSHOP_SESSION_SECRET")]
    pub session_secret: Option<String>,

    /// Credential lifetime in seconds
    #[arg(long, env = "SESSION_MAX_AGE_SECS", default_value = "604800")]
    pub session_max_age_secs: u64,

    /// Watermark for new visitors (0 = first chapter open, -1 = all locked)
    #[arg(long, env = "DEFAULT_WATERMARK", default_value = "0", allow_negative_numbers = true)]
    pub default_watermark: i64,

    /// JSON chapter catalogue; the built-in workshop catalogue when unset
    #[arg(long, env = "CATALOGUE_PATH")]
    pub catalogue_path: Option<PathBuf>,

    /// Comma-separated chapter passwords, indexed by position
    #[arg(long, env = "WORKSHOP_PASSWORDS", value_delimiter = ',')]
    pub workshop_passwords: Vec<String>,

    /// Unlock attempt window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value = "60")]
    pub rate_limit_window_secs: u64,

    /// Unlock attempts allowed per window per client
    #[arg(long, env = "RATE_LIMIT_MAX", default_value = "10")]
    pub rate_limit_max: u32,

    /// Key rate limits on X-Forwarded-For / X-Real-IP instead of the peer
    /// address; only safe behind a proxy that overwrites those headers
    #[arg(long, env = "TRUST_FORWARDED_HEADERS", default_value = "false")]
    pub trust_forwarded_headers: bool,

    /// Enable development mode (dev secret, no Secure cookie flag)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Upstream request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,
}

/// Keep the UTF-8 entries of an environment listing, skipping the rest
pub fn utf8_env_pairs<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// UTF-8 pairs of the process environment.
///
/// Unlike `std::env::vars`, an unrelated non-UTF-8 variable does not panic.
pub fn env_pairs() -> impl Iterator<Item = (String, String)> {
    utf8_env_pairs(std::env::vars_os())
}

/// Fully resolved configuration for the gate components
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub registry: Arc<ChapterRegistry>,
    pub overrides: PasswordOverrides,
    pub rate_limit: RateLimitConfig,
    pub session: SessionConfig,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode {
            match self.session_secret.as_deref() {
                None | Some("") => {
                    return Err("WORKSHOP_SESSION_SECRET is required in production mode".to_string())
                }
                Some(secret) if secret.len() < MIN_SECRET_LEN => {
                    return Err(format!(
                        "WORKSHOP_SESSION_SECRET must be at least {} characters",
                        MIN_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }
        }

        if self.default_watermark < -1 {
            return Err("DEFAULT_WATERMARK must be -1 or greater".to_string());
        }

        if self.rate_limit_window_secs == 0 {
            return Err("RATE_LIMIT_WINDOW_SECS must be greater than zero".to_string());
        }

        if self.rate_limit_max == 0 {
            return Err("RATE_LIMIT_MAX must be greater than zero".to_string());
        }

        if !self.upstream_url.starts_with("http://") && !self.upstream_url.starts_with("https://") {
            return Err("UPSTREAM_URL must be an http(s) URL".to_string());
        }

        Ok(())
    }

    /// Load the chapter catalogue
    pub fn registry(&self) -> Result<ChapterRegistry> {
        match &self.catalogue_path {
            Some(path) => ChapterRegistry::from_json_file(path),
            None => ChapterRegistry::workshop(),
        }
    }

    /// Credential codec for the configured mode
    pub fn credential_codec(&self) -> Result<JwtCredentialCodec> {
        match (&self.session_secret, self.dev_mode) {
            (Some(secret), _) if !secret.is_empty() => {
                JwtCredentialCodec::new(secret.clone(), self.session_max_age_secs)
            }
            (_, true) => Ok(JwtCredentialCodec::new_dev(self.session_max_age_secs)),
            (_, false) => Err(GateError::Config(
                "WORKSHOP_SESSION_SECRET is required in production mode".into(),
            )),
        }
    }

    /// Resolve every component setting once.
    ///
    /// `env_vars` supplies the `WORKSHOP_PW_*` per-chapter overrides.
    pub fn resolve<I>(&self, env_vars: I) -> Result<GateSettings>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let registry = Arc::new(self.registry()?);
        let overrides = PasswordOverrides::from_env_vars(env_vars, &registry)
            .with_bulk(self.workshop_passwords.iter().cloned());

        Ok(GateSettings {
            registry,
            overrides,
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(self.rate_limit_window_secs),
                max_attempts: self.rate_limit_max,
            },
            session: SessionConfig {
                max_age_secs: self.session_max_age_secs,
                secure: !self.dev_mode,
                default_watermark: Watermark::new(self.default_watermark),
                ..SessionConfig::default()
            },
        })
    }

    /// Whether logs are emitted as JSON lines
    pub fn log_json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Upstream request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
