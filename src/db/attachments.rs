//! File attachment queries.

use super::pool::DbPool;
use crate::models::FileAttachment;
use sqlx::SqliteExecutor;

const ATTACHMENT_COLUMNS: &str = "id, review_request_id, caption, filename, mimetype, draft";

pub async fn create_file_attachment(
    pool: &DbPool,
    review_request_id: i64,
    filename: &str,
    draft: bool,
) -> Result<FileAttachment, sqlx::Error> {
    sqlx::query_as::<_, FileAttachment>(&format!(
        "INSERT INTO file_attachments (review_request_id, filename, draft) VALUES (?, ?, ?) \
         RETURNING {}",
        ATTACHMENT_COLUMNS
    ))
    .bind(review_request_id)
    .bind(filename)
    .bind(draft)
    .fetch_one(pool)
    .await
}

/// Delete an attachment. Comments on it go with it.
pub async fn delete_file_attachment(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM file_attachments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_file_attachment(pool: &DbPool, id: i64) -> Result<Option<FileAttachment>, sqlx::Error> {
    sqlx::query_as::<_, FileAttachment>(&format!(
        "SELECT {} FROM file_attachments WHERE id = ?",
        ATTACHMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Store an uploaded file as a draft attachment on a review request.
pub async fn insert_uploaded_attachment<'e, E>(
    executor: E,
    review_request_id: i64,
    filename: &str,
    mimetype: &str,
    content: &[u8],
) -> Result<FileAttachment, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, FileAttachment>(&format!(
        "INSERT INTO file_attachments (review_request_id, filename, mimetype, draft, content) \
         VALUES (?, ?, ?, 1, ?) RETURNING {}",
        ATTACHMENT_COLUMNS
    ))
    .bind(review_request_id)
    .bind(filename)
    .bind(mimetype)
    .bind(content)
    .fetch_one(executor)
    .await
}
