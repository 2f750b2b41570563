//! Diff set and file diff models.

use super::parse_json_object;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::FromRow;

/// One uploaded revision of a review request's diff.
///
/// A draft diff set is visible only to the submitter until the review
/// request draft is published; replacing it deletes the old one, and every
/// comment on it with it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DiffSet {
    pub id: i64,
    pub review_request_id: i64,
    pub revision: i64,
    pub draft: bool,
    pub timestamp: i64,
}

/// A single file's change within a diff set.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FileDiff {
    pub id: i64,
    pub diffset_id: i64,
    pub source_file: String,
    pub dest_file: String,
    pub source_revision: String,
    pub dest_detail: String,
    pub extra_data: String,

    /// Commit within the diff set this change belongs to, if any.
    pub commit_id: Option<String>,

    pub binary: bool,

    /// Uploaded new version of a binary file.
    pub dest_attachment_id: Option<i64>,
}

impl FileDiff {
    pub fn extra_data_map(&self) -> Map<String, Value> {
        parse_json_object(&self.extra_data)
    }
}
