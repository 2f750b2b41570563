//! File attachment model.

use serde::Serialize;
use sqlx::FromRow;

/// A file uploaded to a review request (screenshot, document, ...).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FileAttachment {
    pub id: i64,
    pub review_request_id: i64,
    pub caption: String,
    pub filename: String,
    pub mimetype: String,

    /// Draft attachments are not yet published with the review request.
    pub draft: bool,
}
