//! Chapter positions and the unlock watermark

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based chapter position in catalogue order
pub type Position = usize;

/// Highest unlocked chapter position for one visitor.
///
/// Chapters with `position <= watermark` are unlocked. The value `-1` is the
/// "all locked" sentinel; nothing lower is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(i64);

impl Watermark {
    /// Sentinel: no chapter is unlocked
    pub const ALL_LOCKED: Watermark = Watermark(-1);

    /// Only the first chapter is unlocked
    pub const FIRST_CHAPTER: Watermark = Watermark(0);

    /// Build a watermark, flooring anything below the sentinel
    pub fn new(value: i64) -> Self {
        Self(value.max(Self::ALL_LOCKED.0))
    }

    /// Watermark that unlocks up to and including `position`
    pub fn at(position: Position) -> Self {
        Self(i64::try_from(position).unwrap_or(i64::MAX))
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Whether `position` is at or below this watermark
    pub fn covers(self, position: Position) -> bool {
        i64::try_from(position).map_or(false, |p| p <= self.0)
    }

    /// Clamp into `[floor, chapter_count - 1]`
    ///
    /// Used on values decoded from a credential, which may have been issued
    /// against a longer catalogue.
    pub fn clamp_to(self, floor: Watermark, chapter_count: usize) -> Self {
        let upper = i64::try_from(chapter_count).unwrap_or(i64::MAX) - 1;
        let upper = upper.max(floor.0);
        Self(self.0.clamp(floor.0, upper))
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::FIRST_CHAPTER
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
