//! Database layer for the review server's SQLite storage.
//!
//! This module owns connection setup and schema migrations. Table access
//! lives in one submodule per entity; each exposes plain async functions
//! taking a `&DbPool` (or any executor) so handlers and services compose
//! them without an extra repository layer.

pub mod api_tokens;
pub mod attachments;
pub mod comments;
pub mod diffs;
pub mod local_sites;
pub mod pool;
pub mod repositories;
pub mod review_requests;
pub mod reviews;
pub mod users;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Database-related errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Ordered list of schema migrations: (name, SQL).
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_initial_schema",
        include_str!("migrations/0001_initial_schema.sql"),
    ),
    (
        "0002_filediff_attachments",
        include_str!("migrations/0002_filediff_attachments.sql"),
    ),
];

/// Current Unix timestamp in seconds.
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Open the database, creating the file and its directory if needed, and
/// bring the schema up to date.
pub async fn initialize(db_path: &Path) -> Result<pool::DbPool, DbError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::Migration(format!("Failed to create database directory: {}", e))
            })?;
        }
    }

    let pool = pool::create_pool(db_path).await?;
    run_migrations(&pool).await?;

    log::debug!("[db] Database ready at {}", db_path.display());
    Ok(pool)
}

/// Apply every migration not yet recorded in `_migrations`.
async fn run_migrations(pool: &pool::DbPool) -> Result<(), DbError> {
    let mut conn = pool.acquire().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    for (name, sql) in MIGRATIONS {
        let applied: Option<(i64,)> = sqlx::query_as("SELECT id FROM _migrations WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

        if applied.is_some() {
            continue;
        }

        log::info!("[db] Applying migration {}", name);

        for statement in parse_sql_statements(sql) {
            sqlx::query(&statement)
                .execute(&mut *conn)
                .await
                .map_err(|e| DbError::Migration(format!("{}: {}", name, e)))?;
        }

        sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Split a migration file into statements.
///
/// Skips `--` comments and only treats a semicolon as a terminator when it
/// is outside parentheses and string literals.
fn parse_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut paren_depth: i32 = 0;
    let mut in_string = false;

    for line in sql.lines() {
        if line.trim().starts_with("--") {
            continue;
        }

        let line = match line.find("--") {
            Some(idx) if !in_string => &line[..idx],
            _ => line,
        };

        for ch in line.chars() {
            match ch {
                '\'' => {
                    in_string = !in_string;
                    current.push(ch);
                }
                '(' if !in_string => {
                    paren_depth += 1;
                    current.push(ch);
                }
                ')' if !in_string => {
                    paren_depth = (paren_depth - 1).max(0);
                    current.push(ch);
                }
                ';' if !in_string && paren_depth == 0 => {
                    let stmt = current.trim().to_string();
                    if !stmt.is_empty() {
                        statements.push(stmt);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            current.push(' ');
        }
    }

    let last = current.trim().to_string();
    if !last.is_empty() {
        statements.push(last);
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_initialize_creates_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/reviews.db");

        let pool = initialize(&db_path).await.unwrap();
        assert!(db_path.exists());

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in [
            "api_tokens",
            "comments",
            "diffsets",
            "file_attachment_comments",
            "file_attachments",
            "filediffs",
            "review_requests",
            "reviews",
            "users",
        ] {
            assert!(names.contains(&expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reviews.db");

        let _first = initialize(&db_path).await.unwrap();
        let second = initialize(&db_path).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&second)
            .await
            .unwrap();
        assert_eq!(count.0, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_parse_keeps_semicolons_in_strings_and_parens() {
        let sql = "-- header\nCREATE TABLE a (x TEXT DEFAULT ';', y INTEGER DEFAULT (strftime('%s', 'now')));\nINSERT INTO a (x) VALUES ('b;c'); -- trailing\n";
        let statements = parse_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE a"));
        assert!(statements[1].contains("'b;c'"));
    }
}
