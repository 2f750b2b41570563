//! Review request queries.

use super::pool::DbPool;
use crate::models::ReviewRequest;
use sqlx::SqliteExecutor;

const REVIEW_REQUEST_COLUMNS: &str = "id, submitter_id, repository_id, local_site_id, summary, \
     public, status, shipit_count, time_added, last_updated";

/// Data required to create a review request.
#[derive(Debug, Clone, Default)]
pub struct NewReviewRequest {
    pub submitter_id: i64,
    pub repository_id: Option<i64>,
    pub local_site_id: Option<i64>,
    pub summary: String,
    pub public: bool,
}

pub async fn create_review_request(
    pool: &DbPool,
    input: &NewReviewRequest,
) -> Result<ReviewRequest, sqlx::Error> {
    let now = super::now();

    sqlx::query_as::<_, ReviewRequest>(&format!(
        "INSERT INTO review_requests \
         (submitter_id, repository_id, local_site_id, summary, public, time_added, last_updated) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        REVIEW_REQUEST_COLUMNS
    ))
    .bind(input.submitter_id)
    .bind(input.repository_id)
    .bind(input.local_site_id)
    .bind(&input.summary)
    .bind(input.public)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn get_review_request(
    pool: &DbPool,
    id: i64,
) -> Result<Option<ReviewRequest>, sqlx::Error> {
    sqlx::query_as::<_, ReviewRequest>(&format!(
        "SELECT {} FROM review_requests WHERE id = ?",
        REVIEW_REQUEST_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Publish a review request.
pub async fn publish(pool: &DbPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE review_requests SET public = 1, last_updated = ? WHERE id = ?")
        .bind(super::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Count a newly published Ship It! and record the activity.
pub async fn increment_shipit_count(pool: &DbPool, id: i64, at: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE review_requests SET shipit_count = shipit_count + 1, last_updated = MAX(last_updated, ?) WHERE id = ?",
    )
    .bind(at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Uncount a revoked Ship It!.
///
/// Revocation is not new activity, so `last_updated` is left alone.
pub async fn decrement_shipit_count<'e, E>(executor: E, id: i64) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE review_requests SET shipit_count = MAX(shipit_count - 1, 0) WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Bump `last_updated` for new published activity.
pub async fn touch(pool: &DbPool, id: i64, at: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE review_requests SET last_updated = MAX(last_updated, ?) WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
