//! Local site queries.

use super::pool::DbPool;
use crate::models::LocalSite;

pub async fn create_local_site(
    pool: &DbPool,
    name: &str,
    public: bool,
) -> Result<LocalSite, sqlx::Error> {
    sqlx::query_as::<_, LocalSite>(
        "INSERT INTO local_sites (name, public) VALUES (?, ?) RETURNING id, name, public",
    )
    .bind(name)
    .bind(public)
    .fetch_one(pool)
    .await
}

pub async fn get_local_site(pool: &DbPool, id: i64) -> Result<Option<LocalSite>, sqlx::Error> {
    let site = sqlx::query_as::<_, LocalSite>("SELECT id, name, public FROM local_sites WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match site {
        Some(site) => Ok(Some(load_members(pool, site).await?)),
        None => Ok(None),
    }
}

pub async fn get_local_site_by_name(
    pool: &DbPool,
    name: &str,
) -> Result<Option<LocalSite>, sqlx::Error> {
    let site =
        sqlx::query_as::<_, LocalSite>("SELECT id, name, public FROM local_sites WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;

    match site {
        Some(site) => Ok(Some(load_members(pool, site).await?)),
        None => Ok(None),
    }
}

/// Load a site's optional record by ID, or `None` when `id` is `None`.
pub async fn get_optional(
    pool: &DbPool,
    id: Option<i64>,
) -> Result<Option<LocalSite>, sqlx::Error> {
    match id {
        Some(id) => get_local_site(pool, id).await,
        None => Ok(None),
    }
}

pub async fn add_user(pool: &DbPool, local_site_id: i64, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO local_site_users (local_site_id, user_id) VALUES (?, ?)")
        .bind(local_site_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn add_admin(pool: &DbPool, local_site_id: i64, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO local_site_admins (local_site_id, user_id) VALUES (?, ?)")
        .bind(local_site_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn load_members(pool: &DbPool, mut site: LocalSite) -> Result<LocalSite, sqlx::Error> {
    site.users = sqlx::query_scalar("SELECT user_id FROM local_site_users WHERE local_site_id = ?")
        .bind(site.id)
        .fetch_all(pool)
        .await?;

    site.admins =
        sqlx::query_scalar("SELECT user_id FROM local_site_admins WHERE local_site_id = ?")
            .bind(site.id)
            .fetch_all(pool)
            .await?;

    Ok(site)
}
