//! Changes to the files of a review request's draft diff.

use crate::db::pool::DbPool;
use crate::db::{attachments, diffs};
use crate::error::AppError;
use crate::models::FileDiff;
use crate::services::api_tokens::apply_extra_fields;
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEST_ATTACHMENT_FIELD: &str = "dest_attachment_file";
pub const NOT_BINARY_ERROR: &str = "Cannot upload a file attachment for a non-binary file.";
pub const DEST_ATTACHMENT_EXISTS_ERROR: &str =
    "There is already a file attachment associated with this binary file.";

const DEFAULT_MIMETYPE: &str = "application/octet-stream";

/// The new version of a binary file, uploaded by the submitter.
#[derive(Debug, Clone)]
pub struct DestAttachmentUpload {
    pub filename: String,
    pub mimetype: Option<String>,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateDraftFileDiff {
    pub dest_attachment: Option<DestAttachmentUpload>,
    pub extra_fields: BTreeMap<String, Value>,
}

/// Apply an update to a draft file diff and return the stored result.
///
/// Every field is checked before anything is written; the attachment and
/// `extra_data` changes commit together.
pub async fn update_draft_filediff(
    pool: &DbPool,
    review_request_id: i64,
    filediff: &FileDiff,
    request: UpdateDraftFileDiff,
) -> Result<FileDiff, AppError> {
    if request.dest_attachment.is_some() {
        if !filediff.binary {
            return Err(AppError::invalid_field(DEST_ATTACHMENT_FIELD, NOT_BINARY_ERROR));
        }
        if filediff.dest_attachment_id.is_some() {
            return Err(AppError::invalid_field(
                DEST_ATTACHMENT_FIELD,
                DEST_ATTACHMENT_EXISTS_ERROR,
            ));
        }
    }

    let extra_data = if request.extra_fields.is_empty() {
        None
    } else {
        let mut map = filediff.extra_data_map();
        apply_extra_fields(&mut map, &request.extra_fields)?;
        Some(serde_json::to_string(&map)?)
    };

    let mut tx = pool.begin().await?;

    if let Some(upload) = &request.dest_attachment {
        let attachment = attachments::insert_uploaded_attachment(
            &mut *tx,
            review_request_id,
            &upload.filename,
            upload.mimetype.as_deref().unwrap_or(DEFAULT_MIMETYPE),
            &upload.content,
        )
        .await?;

        if !diffs::set_dest_attachment(&mut *tx, filediff.id, attachment.id).await? {
            return Err(AppError::invalid_field(
                DEST_ATTACHMENT_FIELD,
                DEST_ATTACHMENT_EXISTS_ERROR,
            ));
        }

        log::info!(
            "[diffs] Attachment {} uploaded for file diff {}",
            attachment.id,
            filediff.id
        );
    }

    if let Some(extra_data) = &extra_data {
        diffs::save_extra_data(&mut *tx, filediff.id, extra_data).await?;
    }

    tx.commit().await?;

    diffs::get_filediff(pool, filediff.id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("FileDiff", filediff.id))
}
