//! Chapter visibility decision
//!
//! `is_visible` is the single source of truth for whether a visitor may see
//! a chapter. The request gate enforces it; renderers may call it to decorate
//! navigation, but that use is cosmetic only.

use serde::Serialize;
use std::sync::Arc;

use crate::catalogue::{Chapter, ChapterRegistry};
use crate::types::{Position, Watermark};

/// Whether a resolved position is visible under `watermark`.
///
/// `None` (not in the catalogue) is always visible.
pub fn is_visible(position: Option<Position>, watermark: Watermark) -> bool {
    match position {
        Some(position) => watermark.covers(position),
        None => true,
    }
}

/// A chapter together with its lock flag for one visitor
#[derive(Debug, Clone, Serialize)]
pub struct ChapterStatus<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub position: Position,
    pub path: String,
    pub locked: bool,
}

/// Visibility queries by chapter id
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    registry: Arc<ChapterRegistry>,
}

impl AccessPolicy {
    pub fn new(registry: Arc<ChapterRegistry>) -> Self {
        Self { registry }
    }

    /// Whether the chapter (or page) `id` is visible under `watermark`
    pub fn is_id_visible(&self, id: &str, watermark: Watermark) -> bool {
        is_visible(self.registry.resolve_position(id), watermark)
    }

    /// Every chapter with its lock flag
    pub fn lock_status(&self, watermark: Watermark) -> Vec<ChapterStatus<'_>> {
        self.registry
            .chapters()
            .iter()
            .map(|chapter: &Chapter| ChapterStatus {
                id: &chapter.id,
                title: &chapter.title,
                position: chapter.position,
                path: chapter.path(),
                locked: !is_visible(Some(chapter.position), watermark),
            })
            .collect()
    }

    pub fn registry(&self) -> &ChapterRegistry {
        &self.registry
    }
}
