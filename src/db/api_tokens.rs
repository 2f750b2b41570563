//! Web API token queries.

use super::pool::DbPool;
use crate::models::{NewApiToken, WebApiToken};

const TOKEN_COLUMNS: &str = "id, user_id, local_site_id, token, token_generator_id, note, policy, \
     time_added, last_updated, last_used, expires, valid, invalid_date, invalid_reason, extra_data";

/// Fields a token update may change.
#[derive(Debug, Clone, Default)]
pub struct TokenChanges {
    pub note: Option<String>,
    pub policy: Option<String>,
    /// `Some(None)` clears the expiration.
    pub expires: Option<Option<i64>>,
    pub extra_data: Option<String>,
}

/// Insert a token row.
///
/// A duplicate token value fails with a unique constraint violation; see
/// [`is_unique_violation`].
pub async fn insert_token(pool: &DbPool, input: &NewApiToken) -> Result<WebApiToken, sqlx::Error> {
    let now = super::now();

    sqlx::query_as::<_, WebApiToken>(&format!(
        "INSERT INTO api_tokens \
         (user_id, local_site_id, token, token_generator_id, note, policy, expires, extra_data, \
          time_added, last_updated) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        TOKEN_COLUMNS
    ))
    .bind(input.user_id)
    .bind(input.local_site_id)
    .bind(&input.token)
    .bind(&input.token_generator_id)
    .bind(&input.note)
    .bind(&input.policy)
    .bind(input.expires)
    .bind(&input.extra_data)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Whether an error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Fetch a token owned by `user_id` within a local site scope
/// (`None` is the global scope).
pub async fn get_user_token(
    pool: &DbPool,
    id: i64,
    user_id: i64,
    local_site_id: Option<i64>,
) -> Result<Option<WebApiToken>, sqlx::Error> {
    sqlx::query_as::<_, WebApiToken>(&format!(
        "SELECT {} FROM api_tokens WHERE id = ? AND user_id = ? AND local_site_id IS ?",
        TOKEN_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .bind(local_site_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_by_value(pool: &DbPool, token: &str) -> Result<Option<WebApiToken>, sqlx::Error> {
    sqlx::query_as::<_, WebApiToken>(&format!(
        "SELECT {} FROM api_tokens WHERE token = ?",
        TOKEN_COLUMNS
    ))
    .bind(token)
    .fetch_optional(pool)
    .await
}

/// List a user's tokens within a local site scope, oldest first.
pub async fn list_user_tokens(
    pool: &DbPool,
    user_id: i64,
    local_site_id: Option<i64>,
) -> Result<Vec<WebApiToken>, sqlx::Error> {
    sqlx::query_as::<_, WebApiToken>(&format!(
        "SELECT {} FROM api_tokens WHERE user_id = ? AND local_site_id IS ? ORDER BY time_added, id",
        TOKEN_COLUMNS
    ))
    .bind(user_id)
    .bind(local_site_id)
    .fetch_all(pool)
    .await
}

/// Apply changes to a token and return the updated row.
pub async fn update_token(
    pool: &DbPool,
    id: i64,
    changes: &TokenChanges,
) -> Result<WebApiToken, sqlx::Error> {
    let current = sqlx::query_as::<_, WebApiToken>(&format!(
        "SELECT {} FROM api_tokens WHERE id = ?",
        TOKEN_COLUMNS
    ))
    .bind(id)
    .fetch_one(pool)
    .await?;

    let note = changes.note.as_ref().unwrap_or(&current.note);
    let policy = changes.policy.as_ref().unwrap_or(&current.policy);
    let expires = changes.expires.unwrap_or(current.expires);
    let extra_data = changes.extra_data.as_ref().unwrap_or(&current.extra_data);

    sqlx::query_as::<_, WebApiToken>(&format!(
        "UPDATE api_tokens SET note = ?, policy = ?, expires = ?, extra_data = ?, last_updated = ? \
         WHERE id = ? RETURNING {}",
        TOKEN_COLUMNS
    ))
    .bind(note)
    .bind(policy)
    .bind(expires)
    .bind(extra_data)
    .bind(super::now())
    .bind(id)
    .fetch_one(pool)
    .await
}

/// Invalidate a token by value.
///
/// Only a currently valid token changes, so the first invalidation's date
/// and reason stick. Returns whether a row changed.
pub async fn invalidate_token(
    pool: &DbPool,
    token: &str,
    invalid_reason: &str,
) -> Result<bool, sqlx::Error> {
    let now = super::now();
    let result = sqlx::query(
        "UPDATE api_tokens SET valid = 0, invalid_date = ?, invalid_reason = ?, last_updated = ? \
         WHERE token = ? AND valid = 1",
    )
    .bind(now)
    .bind(invalid_reason)
    .bind(now)
    .bind(token)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record a successful authentication.
pub async fn touch_last_used(pool: &DbPool, id: i64, at: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE api_tokens SET last_used = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_token(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM api_tokens WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
