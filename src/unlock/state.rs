//! Per-visitor unlock state

use serde::{Deserialize, Serialize};

use crate::types::{Position, Watermark};

/// The unlock watermark carried by one visitor's credential.
///
/// Only the unlock protocol advances it, and only upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnlockState {
    watermark: Watermark,
}

impl UnlockState {
    pub fn new(watermark: Watermark) -> Self {
        Self { watermark }
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Raise the watermark to cover `position`; never lowers it
    pub(crate) fn advance_to(&mut self, position: Position) -> Watermark {
        self.watermark = self.watermark.max(Watermark::at(position));
        self.watermark
    }

    /// Explicit session reset back to `default`
    pub fn reset(&mut self, default: Watermark) {
        self.watermark = default;
    }
}
