//! Review queries.

use super::pool::DbPool;
use super::review_requests;
use crate::models::Review;

const REVIEW_COLUMNS: &str = "id, review_request_id, user_id, base_reply_to_id, public, ship_it, \
     body_top, body_bottom, timestamp, extra_data";

/// Data required to create a review or reply.
#[derive(Debug, Clone, Default)]
pub struct NewReview {
    pub review_request_id: i64,
    pub user_id: i64,
    pub base_reply_to_id: Option<i64>,
    pub public: bool,
    pub ship_it: bool,
    pub body_top: String,
    pub body_bottom: String,
}

pub async fn create_review(pool: &DbPool, input: &NewReview) -> Result<Review, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!(
        "INSERT INTO reviews \
         (review_request_id, user_id, base_reply_to_id, public, ship_it, body_top, body_bottom, timestamp) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        REVIEW_COLUMNS
    ))
    .bind(input.review_request_id)
    .bind(input.user_id)
    .bind(input.base_reply_to_id)
    .bind(input.public)
    .bind(input.ship_it)
    .bind(&input.body_top)
    .bind(&input.body_bottom)
    .bind(super::now())
    .fetch_one(pool)
    .await
}

pub async fn get_review(pool: &DbPool, id: i64) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!("SELECT {} FROM reviews WHERE id = ?", REVIEW_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Persist the mutable fields of a review.
pub async fn save_review(pool: &DbPool, review: &Review) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE reviews
        SET public = ?, ship_it = ?, body_top = ?, body_bottom = ?,
            timestamp = ?, extra_data = ?
        WHERE id = ?
        "#,
    )
    .bind(review.public)
    .bind(review.ship_it)
    .bind(&review.body_top)
    .bind(&review.body_bottom)
    .bind(review.timestamp)
    .bind(&review.extra_data)
    .bind(review.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Store a Ship It! revocation and uncount it on the review request in one
/// transaction.
///
/// Only applies while the stored review is still a Ship It!. Returns `false`,
/// with nothing written, when another revocation got there first.
pub async fn save_ship_it_revocation(pool: &DbPool, revoked: &Review) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE reviews SET ship_it = 0, body_top = ?, extra_data = ? WHERE id = ? AND ship_it = 1",
    )
    .bind(&revoked.body_top)
    .bind(&revoked.extra_data)
    .bind(revoked.id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    if revoked.public && !revoked.is_reply() {
        review_requests::decrement_shipit_count(&mut *tx, revoked.review_request_id).await?;
    }

    tx.commit().await?;
    Ok(true)
}
