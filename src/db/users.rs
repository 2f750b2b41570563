//! User queries.

use super::pool::DbPool;
use crate::models::user::{hash_password, User};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_superuser, is_active, date_joined";

/// Data required to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Plaintext; hashed before storage. `None` disables password login.
    pub password: Option<String>,
    pub is_superuser: bool,
}

impl NewUser {
    /// Convenience constructor for a regular user without a password.
    pub fn named(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            email: format!("{}@example.com", username),
            username,
            password: None,
            is_superuser: false,
        }
    }
}

pub async fn create_user(pool: &DbPool, input: &NewUser) -> Result<User, sqlx::Error> {
    let password_hash = input
        .password
        .as_deref()
        .map(hash_password)
        .unwrap_or_default();

    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, password_hash, is_superuser, date_joined) \
         VALUES (?, ?, ?, ?, ?) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&input.username)
    .bind(&input.email)
    .bind(password_hash)
    .bind(input.is_superuser)
    .bind(super::now())
    .fetch_one(pool)
    .await
}

pub async fn get_user(pool: &DbPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_username(
    pool: &DbPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

/// Authors of a review's public replies, without duplicates.
pub async fn get_public_reply_authors(
    pool: &DbPool,
    review_id: i64,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT DISTINCT u.id, u.username, u.email, u.password_hash,
               u.is_superuser, u.is_active, u.date_joined
        FROM users u
        JOIN reviews r ON r.user_id = u.id
        WHERE r.base_reply_to_id = ? AND r.public = 1
        ORDER BY u.username
        "#,
    )
    .bind(review_id)
    .fetch_all(pool)
    .await
}

/// Mark a user active or inactive.
pub async fn set_active(pool: &DbPool, id: i64, is_active: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("t.db")).await.unwrap();

        let created = create_user(
            &pool,
            &NewUser {
                username: "doc".to_string(),
                email: "doc@example.com".to_string(),
                password: Some("doc".to_string()),
                is_superuser: false,
            },
        )
        .await
        .unwrap();

        let fetched = get_user_by_username(&pool, "doc").await.unwrap().unwrap();
        assert_eq!(created, fetched);
        assert!(fetched.check_password("doc"));
        assert!(fetched.is_active);

        set_active(&pool, fetched.id, false).await.unwrap();
        let inactive = get_user(&pool, fetched.id).await.unwrap().unwrap();
        assert!(!inactive.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("t.db")).await.unwrap();

        create_user(&pool, &NewUser::named("grumpy")).await.unwrap();
        assert!(create_user(&pool, &NewUser::named("grumpy")).await.is_err());
    }
}
