//! Repository queries.

use super::pool::DbPool;
use crate::models::Repository;

pub async fn create_repository(
    pool: &DbPool,
    name: &str,
    path: &str,
    public: bool,
    local_site_id: Option<i64>,
) -> Result<Repository, sqlx::Error> {
    sqlx::query_as::<_, Repository>(
        "INSERT INTO repositories (name, path, public, local_site_id) VALUES (?, ?, ?, ?) \
         RETURNING id, name, path, public, local_site_id",
    )
    .bind(name)
    .bind(path)
    .bind(public)
    .bind(local_site_id)
    .fetch_one(pool)
    .await
}

/// Load a repository and its access list.
pub async fn get_repository(pool: &DbPool, id: i64) -> Result<Option<Repository>, sqlx::Error> {
    let repo = sqlx::query_as::<_, Repository>(
        "SELECT id, name, path, public, local_site_id FROM repositories WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(mut repo) = repo else {
        return Ok(None);
    };

    repo.users = sqlx::query_scalar("SELECT user_id FROM repository_users WHERE repository_id = ?")
        .bind(id)
        .fetch_all(pool)
        .await?;

    Ok(Some(repo))
}

pub async fn set_public(pool: &DbPool, id: i64, public: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE repositories SET public = ? WHERE id = ?")
        .bind(public)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn grant_access(
    pool: &DbPool,
    repository_id: i64,
    user_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO repository_users (repository_id, user_id) VALUES (?, ?)")
        .bind(repository_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
