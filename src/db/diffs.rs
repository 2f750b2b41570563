//! Diff set and file diff queries.

use super::pool::DbPool;
use crate::models::{DiffSet, FileDiff};
use sqlx::SqliteExecutor;

const FILEDIFF_COLUMNS: &str = "id, diffset_id, source_file, dest_file, source_revision, dest_detail, \
     extra_data, commit_id, binary, dest_attachment_id";

pub async fn create_diffset(
    pool: &DbPool,
    review_request_id: i64,
    draft: bool,
) -> Result<DiffSet, sqlx::Error> {
    sqlx::query_as::<_, DiffSet>(
        r#"
        INSERT INTO diffsets (review_request_id, revision, draft, timestamp)
        VALUES (
            ?,
            (SELECT COALESCE(MAX(revision), 0) + 1 FROM diffsets WHERE review_request_id = ?),
            ?, ?
        )
        RETURNING id, review_request_id, revision, draft, timestamp
        "#,
    )
    .bind(review_request_id)
    .bind(review_request_id)
    .bind(draft)
    .bind(super::now())
    .fetch_one(pool)
    .await
}

/// Data required to create a file diff.
#[derive(Debug, Clone, Default)]
pub struct NewFileDiff {
    pub diffset_id: i64,
    pub source_file: String,
    pub dest_file: String,
    pub source_revision: String,
    pub commit_id: Option<String>,
    pub binary: bool,
}

pub async fn insert_filediff(pool: &DbPool, input: &NewFileDiff) -> Result<FileDiff, sqlx::Error> {
    sqlx::query_as::<_, FileDiff>(&format!(
        "INSERT INTO filediffs (diffset_id, source_file, dest_file, source_revision, commit_id, binary) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
        FILEDIFF_COLUMNS
    ))
    .bind(input.diffset_id)
    .bind(&input.source_file)
    .bind(&input.dest_file)
    .bind(&input.source_revision)
    .bind(&input.commit_id)
    .bind(input.binary)
    .fetch_one(pool)
    .await
}

pub async fn create_filediff(
    pool: &DbPool,
    diffset_id: i64,
    source_file: &str,
    dest_file: &str,
) -> Result<FileDiff, sqlx::Error> {
    insert_filediff(
        pool,
        &NewFileDiff {
            diffset_id,
            source_file: source_file.to_string(),
            dest_file: dest_file.to_string(),
            ..Default::default()
        },
    )
    .await
}

/// The draft diff set with the given revision on a review request.
pub async fn get_draft_diffset(
    pool: &DbPool,
    review_request_id: i64,
    revision: i64,
) -> Result<Option<DiffSet>, sqlx::Error> {
    sqlx::query_as::<_, DiffSet>(
        "SELECT id, review_request_id, revision, draft, timestamp FROM diffsets \
         WHERE review_request_id = ? AND revision = ? AND draft = 1",
    )
    .bind(review_request_id)
    .bind(revision)
    .fetch_optional(pool)
    .await
}

pub async fn get_filediff(pool: &DbPool, id: i64) -> Result<Option<FileDiff>, sqlx::Error> {
    sqlx::query_as::<_, FileDiff>(&format!("SELECT {} FROM filediffs WHERE id = ?", FILEDIFF_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// File diffs in a diff set, optionally only those in one commit.
pub async fn list_filediffs(
    pool: &DbPool,
    diffset_id: i64,
    commit_id: Option<&str>,
) -> Result<Vec<FileDiff>, sqlx::Error> {
    match commit_id {
        Some(commit_id) => {
            sqlx::query_as::<_, FileDiff>(&format!(
                "SELECT {} FROM filediffs WHERE diffset_id = ? AND commit_id = ? ORDER BY id",
                FILEDIFF_COLUMNS
            ))
            .bind(diffset_id)
            .bind(commit_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, FileDiff>(&format!(
                "SELECT {} FROM filediffs WHERE diffset_id = ? ORDER BY id",
                FILEDIFF_COLUMNS
            ))
            .bind(diffset_id)
            .fetch_all(pool)
            .await
        }
    }
}

pub async fn save_extra_data<'e, E>(executor: E, id: i64, extra_data: &str) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE filediffs SET extra_data = ? WHERE id = ?")
        .bind(extra_data)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Link a binary file's new-version attachment. Returns `false`, with
/// nothing changed, when the file diff already has one.
pub async fn set_dest_attachment<'e, E>(
    executor: E,
    id: i64,
    attachment_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE filediffs SET dest_attachment_id = ? WHERE id = ? AND dest_attachment_id IS NULL",
    )
    .bind(attachment_id)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Mark a draft diff set as published.
pub async fn publish_diffset(pool: &DbPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE diffsets SET draft = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a diff set. File diffs and every comment on them go with it.
pub async fn delete_diffset(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM diffsets WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
