//! Diff comment and file attachment comment queries.

use super::pool::DbPool;
use crate::models::{Comment, FileAttachmentComment};

const COMMENT_COLUMNS: &str = "id, review_id, filediff_id, interfilediff_id, first_line, num_lines, \
     text, issue_opened, timestamp, extra_data";

const FILE_ATTACHMENT_COMMENT_COLUMNS: &str = "id, review_id, file_attachment_id, \
     diff_against_file_attachment_id, text, issue_opened, timestamp, extra_data";

/// Data required to create a diff comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub review_id: i64,
    pub filediff_id: i64,
    pub interfilediff_id: Option<i64>,
    pub first_line: i64,
    pub num_lines: i64,
    pub text: String,
    pub issue_opened: bool,
}

impl NewComment {
    pub fn on(review_id: i64, filediff_id: i64) -> Self {
        Self {
            review_id,
            filediff_id,
            interfilediff_id: None,
            first_line: 1,
            num_lines: 1,
            text: "My comment".to_string(),
            issue_opened: false,
        }
    }
}

pub async fn create_comment(pool: &DbPool, input: &NewComment) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        "INSERT INTO comments \
         (review_id, filediff_id, interfilediff_id, first_line, num_lines, text, issue_opened, timestamp) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        COMMENT_COLUMNS
    ))
    .bind(input.review_id)
    .bind(input.filediff_id)
    .bind(input.interfilediff_id)
    .bind(input.first_line)
    .bind(input.num_lines)
    .bind(&input.text)
    .bind(input.issue_opened)
    .bind(super::now())
    .fetch_one(pool)
    .await
}

pub async fn create_file_attachment_comment(
    pool: &DbPool,
    review_id: i64,
    file_attachment_id: i64,
    diff_against_file_attachment_id: Option<i64>,
    text: &str,
) -> Result<FileAttachmentComment, sqlx::Error> {
    sqlx::query_as::<_, FileAttachmentComment>(&format!(
        "INSERT INTO file_attachment_comments \
         (review_id, file_attachment_id, diff_against_file_attachment_id, text, timestamp) \
         VALUES (?, ?, ?, ?, ?) RETURNING {}",
        FILE_ATTACHMENT_COMMENT_COLUMNS
    ))
    .bind(review_id)
    .bind(file_attachment_id)
    .bind(diff_against_file_attachment_id)
    .bind(text)
    .bind(super::now())
    .fetch_one(pool)
    .await
}

pub async fn get_comment(pool: &DbPool, id: i64) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_file_attachment_comment(
    pool: &DbPool,
    id: i64,
) -> Result<Option<FileAttachmentComment>, sqlx::Error> {
    sqlx::query_as::<_, FileAttachmentComment>(&format!(
        "SELECT {} FROM file_attachment_comments WHERE id = ?",
        FILE_ATTACHMENT_COMMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Whether any of the review's diff comments touch a draft diff set,
/// on either side of an interdiff.
pub async fn has_draft_diff_comments(pool: &DbPool, review_id: i64) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT 1
        FROM comments c
        JOIN filediffs f ON f.id = c.filediff_id
        JOIN diffsets d ON d.id = f.diffset_id
        LEFT JOIN filediffs fi ON fi.id = c.interfilediff_id
        LEFT JOIN diffsets di ON di.id = fi.diffset_id
        WHERE c.review_id = ? AND (d.draft = 1 OR COALESCE(di.draft, 0) = 1)
        LIMIT 1
        "#,
    )
    .bind(review_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Whether any of the review's file attachment comments touch a draft
/// attachment.
pub async fn has_draft_file_attachment_comments(
    pool: &DbPool,
    review_id: i64,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT 1
        FROM file_attachment_comments c
        JOIN file_attachments a ON a.id = c.file_attachment_id
        LEFT JOIN file_attachments da ON da.id = c.diff_against_file_attachment_id
        WHERE c.review_id = ? AND (a.draft = 1 OR COALESCE(da.draft, 0) = 1)
        LIMIT 1
        "#,
    )
    .bind(review_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}
