//! Web API token model.

use super::token_policy;
use super::user::User;
use super::{parse_json_object, to_iso8601};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::FromRow;

/// A long-lived credential usable instead of a password.
///
/// Validity only ever moves from `true` to `false`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WebApiToken {
    pub id: i64,

    /// Owner of the token.
    pub user_id: i64,

    /// Local site the token is scoped to, if any.
    pub local_site_id: Option<i64>,

    /// The secret token value.
    pub token: String,

    /// ID of the generator that produced `token`.
    pub token_generator_id: String,

    /// What the owner uses this token for.
    pub note: String,

    /// JSON access policy (see `token_policy`).
    pub policy: String,

    pub time_added: i64,
    pub last_updated: i64,

    /// Last successful authentication (Unix).
    pub last_used: Option<i64>,

    /// Expiration (Unix); `None` never expires.
    pub expires: Option<i64>,

    pub valid: bool,

    /// When the token was invalidated (Unix).
    pub invalid_date: Option<i64>,

    pub invalid_reason: String,

    pub extra_data: String,
}

impl WebApiToken {
    /// Whether the token has passed its expiration time.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|expires| now >= expires)
    }

    /// Whether the token can currently authenticate.
    pub fn is_usable(&self, now: i64) -> bool {
        self.valid && !self.is_expired(now)
    }

    pub fn policy_map(&self) -> Map<String, Value> {
        parse_json_object(&self.policy)
    }

    pub fn extra_data_map(&self) -> Map<String, Value> {
        parse_json_object(&self.extra_data)
    }

    /// Whether the token's policy lets it call `method` on a resource.
    pub fn allows(&self, policy_id: &str, method: &str, object_id: Option<&str>) -> bool {
        token_policy::is_access_allowed(&self.policy_map(), policy_id, method, object_id)
    }

    pub fn is_accessible_by(&self, viewer: Option<&User>) -> bool {
        viewer.is_some_and(|u| u.is_superuser || u.id == self.user_id)
    }

    pub fn is_mutable_by(&self, viewer: Option<&User>) -> bool {
        self.is_accessible_by(viewer)
    }

    pub fn is_deletable_by(&self, viewer: Option<&User>) -> bool {
        self.is_accessible_by(viewer)
    }

    pub fn expires_iso(&self) -> Option<String> {
        self.expires.map(to_iso8601)
    }
}

/// Data required to store a freshly generated token.
#[derive(Debug, Clone)]
pub struct NewApiToken {
    pub user_id: i64,
    pub local_site_id: Option<i64>,
    pub token: String,
    pub token_generator_id: String,
    pub note: String,
    pub policy: String,
    pub expires: Option<i64>,
    pub extra_data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(expires: Option<i64>, valid: bool) -> WebApiToken {
        WebApiToken {
            id: 1,
            user_id: 7,
            local_site_id: None,
            token: "rbp_abc".to_string(),
            token_generator_id: "vendor_checksum".to_string(),
            note: "CI".to_string(),
            policy: "{}".to_string(),
            time_added: 0,
            last_updated: 0,
            last_used: None,
            expires,
            valid,
            invalid_date: None,
            invalid_reason: String::new(),
            extra_data: "{}".to_string(),
        }
    }

    fn user(id: i64, is_superuser: bool) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: String::new(),
            password_hash: String::new(),
            is_superuser,
            is_active: true,
            date_joined: 0,
        }
    }

    #[test]
    fn test_is_expired() {
        assert!(!make_token(None, true).is_expired(1_000));
        assert!(!make_token(Some(2_000), true).is_expired(1_000));
        assert!(make_token(Some(1_000), true).is_expired(1_000));
        assert!(make_token(Some(500), true).is_expired(1_000));
    }

    #[test]
    fn test_is_usable() {
        assert!(make_token(None, true).is_usable(10));
        assert!(!make_token(None, false).is_usable(10));
        assert!(!make_token(Some(5), true).is_usable(10));
    }

    #[test]
    fn test_access_is_owner_or_superuser() {
        let token = make_token(None, true);
        assert!(token.is_accessible_by(Some(&user(7, false))));
        assert!(token.is_mutable_by(Some(&user(1, true))));
        assert!(!token.is_deletable_by(Some(&user(1, false))));
        assert!(!token.is_accessible_by(None));
    }

    #[test]
    fn test_expires_iso() {
        assert_eq!(make_token(None, true).expires_iso(), None);
        assert_eq!(
            make_token(Some(0), true).expires_iso().as_deref(),
            Some("1970-01-01T00:00:00Z")
        );
    }
}
