//! User account model.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::FromRow;

/// Prefix identifying the password hash scheme.
const HASH_SCHEME: &str = "sha256";
const SALT_LENGTH: usize = 16;

/// A registered user.
///
/// Equality and hashing cover every column, so two loads of the same row
/// compare equal and collect into one `HashSet` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, FromRow)]
pub struct User {
    pub id: i64,

    /// Unique login name.
    pub username: String,

    pub email: String,

    /// `sha256$<salt>$<hex digest>`; empty when password login is disabled.
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Superusers bypass every ownership check.
    pub is_superuser: bool,

    /// Inactive users cannot authenticate.
    pub is_active: bool,

    /// Account creation timestamp (Unix).
    pub date_joined: i64,
}

impl User {
    /// Check a plaintext password against the stored hash.
    pub fn check_password(&self, password: &str) -> bool {
        let mut parts = self.password_hash.splitn(3, '$');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(HASH_SCHEME), Some(salt), Some(digest)) => {
                digest_password(salt, password) == digest
            }
            _ => false,
        }
    }
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect();

    format!(
        "{}${}${}",
        HASH_SCHEME,
        salt,
        digest_password(&salt, password)
    )
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// True when the viewer is an authenticated superuser.
pub fn is_superuser(viewer: Option<&User>) -> bool {
    viewer.is_some_and(|u| u.is_superuser)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user(password_hash: String) -> User {
        User {
            id: 1,
            username: "doc".to_string(),
            email: "doc@example.com".to_string(),
            password_hash,
            is_superuser: false,
            is_active: true,
            date_joined: 0,
        }
    }

    #[test]
    fn test_password_round_trip() {
        let user = make_user(hash_password("s3cret"));
        assert!(user.check_password("s3cret"));
        assert!(!user.check_password("S3cret"));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_empty_hash_never_matches() {
        let user = make_user(String::new());
        assert!(!user.check_password(""));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = make_user(hash_password("x"));
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
    }
}
