//! Ordered chapter registry
//!
//! The registry is built once at startup and shared behind an `Arc`. It is
//! the only place that maps a content id to its catalogue position.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{GateError, Position, Result};

/// Path prefix under which gated content is served
pub const CONTENT_PREFIX: &str = "/docs";

/// File extensions stripped from ids before lookup
const KNOWN_EXTENSIONS: &[&str] = &[".mdx", ".md"];

/// One gated chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Stable slug, e.g. `workshop/03-iam`
    pub id: String,
    /// Display label, also a password derivation input
    pub title: String,
    /// Zero-based catalogue position
    pub position: Position,
}

impl Chapter {
    /// Public path of this chapter on the content site
    pub fn path(&self) -> String {
        format!("{}/{}", CONTENT_PREFIX, self.id)
    }
}

/// Entry in a catalogue file. Position defaults to the array index.
#[derive(Debug, Clone, Deserialize)]
struct CatalogueEntry {
    id: String,
    title: String,
    #[serde(default)]
    position: Option<Position>,
}

/// Normalize a request path or slug into a chapter id
///
/// Strips the `/docs/` prefix, leading and trailing slashes, and a known
/// file extension: `/docs/workshop/03-iam.mdx` becomes `workshop/03-iam`.
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix(CONTENT_PREFIX)
        .filter(|rest| rest.starts_with('/'))
        .unwrap_or(trimmed);

    let mut id = without_prefix.trim_start_matches('/').trim_end_matches('/');
    for ext in KNOWN_EXTENSIONS {
        if let Some(stem) = id.strip_suffix(ext) {
            id = stem;
            break;
        }
    }
    id.to_string()
}

/// Static ordered catalogue of chapters
#[derive(Debug, Clone)]
pub struct ChapterRegistry {
    chapters: Vec<Chapter>,
    by_id: HashMap<String, Position>,
}

impl ChapterRegistry {
    /// Build a registry, enforcing the catalogue invariants:
    /// positions are exactly `0..N-1` in order, ids are non-empty and unique.
    pub fn new(chapters: Vec<Chapter>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(chapters.len());

        for (index, chapter) in chapters.iter().enumerate() {
            if chapter.position != index {
                return Err(GateError::Catalogue(format!(
                    "chapter '{}' has position {} but is listed at {}",
                    chapter.id, chapter.position, index
                )));
            }

            let id = normalize_id(&chapter.id);
            if id.is_empty() {
                return Err(GateError::Catalogue(format!(
                    "chapter at position {} has an empty id",
                    index
                )));
            }
            if id != chapter.id {
                return Err(GateError::Catalogue(format!(
                    "chapter id '{}' is not normalized (expected '{}')",
                    chapter.id, id
                )));
            }
            if by_id.insert(id, index).is_some() {
                return Err(GateError::Catalogue(format!(
                    "duplicate chapter id '{}'",
                    chapter.id
                )));
            }
        }

        debug!(chapters = chapters.len(), "Built chapter registry");
        Ok(Self { chapters, by_id })
    }

    /// Build from `(id, title)` pairs in catalogue order
    pub fn from_pairs<I, S, T>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let chapters = pairs
            .into_iter()
            .enumerate()
            .map(|(position, (id, title))| Chapter {
                id: id.into(),
                title: title.into(),
                position,
            })
            .collect();
        Self::new(chapters)
    }

    /// Parse a JSON catalogue: an array of `{ "id", "title", "position"? }`
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<CatalogueEntry> = serde_json::from_str(json)
            .map_err(|e| GateError::Catalogue(format!("invalid catalogue JSON: {}", e)))?;

        let chapters = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Chapter {
                id: entry.id,
                title: entry.title,
                position: entry.position.unwrap_or(index),
            })
            .collect();
        Self::new(chapters)
    }

    /// Load a JSON catalogue from disk
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            GateError::Catalogue(format!("failed to read {}: {}", path.display(), e))
        })?;
        let registry = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            chapters = registry.len(),
            "Loaded chapter catalogue"
        );
        Ok(registry)
    }

    /// Resolve an id (or request path) to its position.
    ///
    /// `None` means the id is not access-controlled, not an error.
    pub fn resolve_position(&self, id: &str) -> Option<Position> {
        self.by_id.get(&normalize_id(id)).copied()
    }

    /// Resolve an id to its chapter
    pub fn resolve(&self, id: &str) -> Option<&Chapter> {
        self.resolve_position(id).and_then(|p| self.chapter(p))
    }

    pub fn chapter(&self, position: Position) -> Option<&Chapter> {
        self.chapters.get(position)
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Chapter following `id` in catalogue order
    pub fn next_chapter(&self, id: &str) -> Option<&Chapter> {
        let position = self.resolve_position(id)?;
        self.chapter(position + 1)
    }

    /// Chapter preceding `id` in catalogue order
    pub fn previous_chapter(&self, id: &str) -> Option<&Chapter> {
        let position = self.resolve_position(id)?;
        position.checked_sub(1).and_then(|p| self.chapter(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> ChapterRegistry {
        ChapterRegistry::from_pairs([
            ("intro/01-start", "Start"),
            ("intro/02-middle", "Middle"),
            ("intro/03-end", "End"),
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("/docs/workshop/03-iam"), "workshop/03-iam");
        assert_eq!(normalize_id("/docs/workshop/03-iam.mdx"), "workshop/03-iam");
        assert_eq!(normalize_id("workshop/03-iam.md"), "workshop/03-iam");
        assert_eq!(normalize_id("///workshop/03-iam/"), "workshop/03-iam");
        assert_eq!(normalize_id("  workshop/03-iam  "), "workshop/03-iam");
        // Only a real path segment prefix is stripped
        assert_eq!(normalize_id("/docsify/page"), "docsify/page");
        assert_eq!(normalize_id("/docs"), "docs");
    }

    #[test]
    fn test_resolve_position() {
        let registry = small();
        assert_eq!(registry.resolve_position("intro/01-start"), Some(0));
        assert_eq!(registry.resolve_position("/docs/intro/03-end.mdx"), Some(2));
        assert_eq!(registry.resolve_position("guides/getting-started"), None);
        assert_eq!(registry.resolve_position(""), None);
    }

    #[test]
    fn test_neighbours() {
        let registry = small();
        assert_eq!(
            registry.next_chapter("intro/01-start").map(|c| c.position),
            Some(1)
        );
        assert!(registry.next_chapter("intro/03-end").is_none());
        assert!(registry.previous_chapter("intro/01-start").is_none());
        assert_eq!(
            registry.previous_chapter("intro/03-end").map(|c| c.id.as_str()),
            Some("intro/02-middle")
        );
        assert!(registry.next_chapter("unknown").is_none());
    }

    #[test]
    fn test_rejects_gap_in_positions() {
        let chapters = vec![
            Chapter { id: "a".into(), title: "A".into(), position: 0 },
            Chapter { id: "b".into(), title: "B".into(), position: 2 },
        ];
        assert!(matches!(
            ChapterRegistry::new(chapters),
            Err(GateError::Catalogue(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = ChapterRegistry::from_pairs([("a", "A"), ("a", "Again")]);
        assert!(matches!(result, Err(GateError::Catalogue(_))));
    }

    #[test]
    fn test_rejects_unnormalized_or_empty_ids() {
        assert!(ChapterRegistry::from_pairs([("/docs/a.mdx", "A")]).is_err());
        assert!(ChapterRegistry::from_pairs([("", "Nothing")]).is_err());
    }

    #[test]
    fn test_from_json() {
        let registry = ChapterRegistry::from_json(
            r#"[
                {"id": "course/01-basics", "title": "Basics"},
                {"id": "course/02-advanced", "title": "Advanced", "position": 1}
            ]"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve_position("course/02-advanced"), Some(1));
        assert_eq!(registry.chapter(0).unwrap().path(), "/docs/course/01-basics");
    }

    #[test]
    fn test_from_json_rejects_wrong_explicit_position() {
        let result = ChapterRegistry::from_json(
            r#"[{"id": "a", "title": "A", "position": 3}]"#,
        );
        assert!(result.is_err());
        assert!(ChapterRegistry::from_json("not json").is_err());
    }
}
