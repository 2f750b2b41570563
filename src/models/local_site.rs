//! Local site model.
//!
//! A local site partitions users, repositories, review requests and tokens
//! into a separately administered namespace (`/s/<name>/...` in the API).

use super::user::User;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LocalSite {
    pub id: i64,

    /// URL-safe unique name.
    pub name: String,

    /// Public sites are readable by anyone.
    pub public: bool,

    /// Member user IDs (loaded separately).
    #[sqlx(skip)]
    pub users: Vec<i64>,

    /// Administrator user IDs (loaded separately).
    #[sqlx(skip)]
    pub admins: Vec<i64>,
}

impl LocalSite {
    /// Whether the user is a member or an administrator of the site.
    pub fn is_member(&self, user: &User) -> bool {
        self.users.contains(&user.id) || self.admins.contains(&user.id)
    }

    /// Whether the viewer can see content on this site.
    pub fn is_accessible_by(&self, viewer: Option<&User>) -> bool {
        self.public || viewer.is_some_and(|u| u.is_superuser || self.is_member(u))
    }

    /// Whether the viewer administers this site.
    pub fn is_mutable_by(&self, viewer: Option<&User>) -> bool {
        viewer.is_some_and(|u| u.is_superuser || self.admins.contains(&u.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn site(public: bool) -> LocalSite {
        LocalSite {
            id: 1,
            name: "local-site-1".to_string(),
            public,
            users: vec![2],
            admins: vec![3],
        }
    }

    #[test]
    fn test_private_site_access() {
        let site = site(false);
        assert!(!site.is_accessible_by(None));
        assert!(!site.is_accessible_by(Some(&user(1, false))));
        assert!(site.is_accessible_by(Some(&user(2, false))));
        assert!(site.is_accessible_by(Some(&user(3, false))));
        assert!(site.is_accessible_by(Some(&user(9, true))));
    }

    #[test]
    fn test_public_site_open_to_anonymous() {
        assert!(site(true).is_accessible_by(None));
    }

    #[test]
    fn test_only_admins_and_superusers_mutate() {
        let site = site(false);
        assert!(!site.is_mutable_by(None));
        assert!(!site.is_mutable_by(Some(&user(2, false))));
        assert!(site.is_mutable_by(Some(&user(3, false))));
        assert!(site.is_mutable_by(Some(&user(9, true))));
    }
}
