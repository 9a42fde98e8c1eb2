//! Built-in workshop catalogue
//!
//! Mirrors the files under `content/docs/workshop/` on the documentation site.

use super::registry::ChapterRegistry;
use crate::types::Result;

/// `(id, title)` for every workshop chapter, in reading order
pub const WORKSHOP_CHAPTERS: &[(&str, &str)] = &[
    ("workshop/01-overview", "Project Overview"),
    ("workshop/02-aws-resources", "AWS Resources"),
    ("workshop/03-iam", "IAM Setup"),
    ("workshop/04-upload-flow-raw", "Upload Flow - Raw"),
    ("workshop/05-s3-trigger", "S3 Trigger"),
    ("workshop/06-ingest-lambda", "Ingest Lambda"),
    ("workshop/07-detect-faces", "Detect Faces"),
    ("workshop/08-lambda-layer", "Lambda Layer"),
    ("workshop/09-crop-thumbnail", "Crop Thumbnail"),
    ("workshop/10-search-faces", "Search Faces"),
    ("workshop/11-index-faces", "Index Faces"),
    ("workshop/12-occurrences", "Occurrences"),
    ("workshop/13-api-lambda", "API Lambda"),
    ("workshop/14-api-gateway", "API Gateway"),
];

impl ChapterRegistry {
    /// The reference 14-chapter workshop catalogue
    pub fn workshop() -> Result<Self> {
        Self::from_pairs(WORKSHOP_CHAPTERS.iter().copied())
    }
}
