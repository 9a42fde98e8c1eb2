//! Chapter password derivation and verification
//!
//! No password is stored. Each one is recomputed on demand, in this order:
//!
//! 1. Per-chapter override (`WORKSHOP_PW_<SLUG>`, then `WORKSHOP_PW_<INDEX>`)
//! 2. Bulk list override (`WORKSHOP_PASSWORDS`, indexed by position)
//! 3. Deterministic 6-character password seeded from the chapter title
//! 4. `chapter{position}` when no chapter exists at that position
//!
//! Supplied passwords are always compared in constant time.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalogue::{normalize_id, ChapterRegistry};
use crate::types::Position;

/// Length of a derived password
pub const PASSWORD_LENGTH: usize = 6;

/// Derivation alphabet: uppercase without I/O, lowercase without i/l/o,
/// digits without 0/1, and eight symbols.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789!@#$%^&*";

const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233280;

/// Environment variable prefix for per-chapter overrides
pub const OVERRIDE_ENV_PREFIX: &str = "WORKSHOP_PW_";

/// Seed packs the first UTF-16 code unit, the UTF-16 length and the position
/// into disjoint-ish ranges so chapters sharing a title length still differ.
fn derivation_seed(title: &str, position: Position) -> u64 {
    let first_code = u64::from(title.encode_utf16().next().unwrap_or(0));
    let title_len = title.encode_utf16().count() as u64;
    (first_code * 256 + title_len) * 64 + position as u64
}

/// Deterministic password for a chapter title and position
pub fn derive_password(title: &str, position: Position) -> String {
    let mut state = derivation_seed(title, position);
    let mut password = String::with_capacity(PASSWORD_LENGTH);

    for _ in 0..PASSWORD_LENGTH {
        state = (state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        let index = (state * ALPHABET.len() as u64 / LCG_MODULUS) as usize;
        password.push(char::from(ALPHABET[index]));
    }

    password
}

/// Password used when a position has no chapter
fn fallback_password(position: Position) -> String {
    format!("chapter{}", position)
}

/// Environment key suffix for a chapter id: `workshop/01-overview` becomes
/// `WORKSHOP_01_OVERVIEW`.
pub fn env_key_for_id(id: &str) -> String {
    normalize_id(id)
        .chars()
        .map(|c| match c {
            '/' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Operator-configured passwords, resolved once at startup
#[derive(Debug, Clone, Default)]
pub struct PasswordOverrides {
    by_id: HashMap<String, String>,
    by_position: HashMap<Position, String>,
    bulk: Vec<String>,
}

impl PasswordOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the password for one chapter id
    pub fn with_id(mut self, id: &str, password: impl Into<String>) -> Self {
        self.by_id.insert(normalize_id(id), password.into());
        self
    }

    /// Override the password for one position
    pub fn with_position(mut self, position: Position, password: impl Into<String>) -> Self {
        self.by_position.insert(position, password.into());
        self
    }

    /// Set the bulk list, indexed by position
    pub fn with_bulk<I, S>(mut self, passwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bulk = passwords
            .into_iter()
            .map(|p| p.into().trim().to_string())
            .collect();
        self
    }

    /// Collect `WORKSHOP_PW_*` overrides from environment-style pairs.
    ///
    /// Numeric suffixes key by position; other suffixes are matched against
    /// the env key of every chapter id. Empty values are ignored.
    pub fn from_env_vars<I>(vars: I, registry: &ChapterRegistry) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let id_keys: HashMap<String, &str> = registry
            .chapters()
            .iter()
            .map(|c| (env_key_for_id(&c.id), c.id.as_str()))
            .collect();

        let mut overrides = Self::new();
        for (key, value) in vars {
            let Some(suffix) = key.strip_prefix(OVERRIDE_ENV_PREFIX) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            if let Ok(position) = suffix.parse::<Position>() {
                debug!(position, "Password override by position");
                overrides.by_position.insert(position, value);
            } else if let Some(id) = id_keys.get(suffix) {
                debug!(id = %id, "Password override by id");
                overrides.by_id.insert((*id).to_string(), value);
            } else {
                warn!(key = %key, "Ignoring password override for unknown chapter");
            }
        }
        overrides
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.by_position.is_empty() && self.bulk.is_empty()
    }

    fn bulk_entry(&self, position: Position) -> Option<&str> {
        self.bulk
            .get(position)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }
}

/// Which rule produced a chapter's password
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordSource {
    IdOverride,
    PositionOverride,
    BulkList,
    Derived,
    Fallback,
}

impl fmt::Display for PasswordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordSource::IdOverride => write!(f, "override (id)"),
            PasswordSource::PositionOverride => write!(f, "override (index)"),
            PasswordSource::BulkList => write!(f, "WORKSHOP_PASSWORDS"),
            PasswordSource::Derived => write!(f, "derived"),
            PasswordSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// One line of the organiser password sheet
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub position: Position,
    pub id: String,
    pub title: String,
    pub password: String,
    pub source: PasswordSource,
}

/// Resolves the expected password for a chapter position
#[derive(Debug, Clone)]
pub struct PasswordDeriver {
    registry: Arc<ChapterRegistry>,
    overrides: PasswordOverrides,
}

impl PasswordDeriver {
    pub fn new(registry: Arc<ChapterRegistry>, overrides: PasswordOverrides) -> Self {
        Self { registry, overrides }
    }

    /// Expected password for `position`
    pub fn password_for(&self, position: Position) -> String {
        self.resolve(position).0
    }

    /// Expected password and the rule that produced it
    pub fn resolve(&self, position: Position) -> (String, PasswordSource) {
        let chapter = self.registry.chapter(position);

        if let Some(password) = chapter.and_then(|c| self.overrides.by_id.get(&c.id)) {
            return (password.clone(), PasswordSource::IdOverride);
        }
        if let Some(password) = self.overrides.by_position.get(&position) {
            return (password.clone(), PasswordSource::PositionOverride);
        }
        if let Some(password) = self.overrides.bulk_entry(position) {
            return (password.to_string(), PasswordSource::BulkList);
        }

        match chapter {
            Some(chapter) => (
                derive_password(&chapter.title, chapter.position),
                PasswordSource::Derived,
            ),
            None => (fallback_password(position), PasswordSource::Fallback),
        }
    }

    /// Check a supplied password against `position` in constant time
    pub fn verify(&self, position: Position, supplied: &str) -> bool {
        let expected = self.password_for(position);
        constant_time_eq(supplied, &expected)
    }

    /// Every chapter with its current password, for organisers
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.registry
            .chapters()
            .iter()
            .map(|chapter| {
                let (password, source) = self.resolve(chapter.position);
                RosterEntry {
                    position: chapter.position,
                    id: chapter.id.clone(),
                    title: chapter.title.clone(),
                    password,
                    source,
                }
            })
            .collect()
    }
}

/// Result of a byte comparison, with the number of bytes read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Comparison {
    pub matched: bool,
    pub bytes_examined: usize,
}

/// Lengths are checked first and content is never read when they differ.
/// Equal lengths XOR-accumulate every byte before deciding.
pub(crate) fn compare(supplied: &[u8], expected: &[u8]) -> Comparison {
    if supplied.len() != expected.len() {
        return Comparison {
            matched: false,
            bytes_examined: 0,
        };
    }

    let mut diff: u8 = 0;
    let mut examined = 0;
    for (a, b) in supplied.iter().zip(expected.iter()) {
        diff |= a ^ b;
        examined += 1;
    }

    Comparison {
        matched: diff == 0,
        bytes_examined: examined,
    }
}

/// Constant-time string equality
pub fn constant_time_eq(supplied: &str, expected: &str) -> bool {
    compare(supplied.as_bytes(), expected.as_bytes()).matched
}
