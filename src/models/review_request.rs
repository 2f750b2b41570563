//! Review request model.

use super::local_site::LocalSite;
use super::repository::Repository;
use super::user::User;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle status of a review request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewRequestStatus {
    Pending,
    Submitted,
    Discarded,
}

impl From<&str> for ReviewRequestStatus {
    fn from(s: &str) -> Self {
        match s {
            "S" => Self::Submitted,
            "D" => Self::Discarded,
            _ => Self::Pending,
        }
    }
}

impl ReviewRequestStatus {
    /// Single-letter code stored in the `status` column.
    pub fn code(self) -> &'static str {
        match self {
            Self::Pending => "P",
            Self::Submitted => "S",
            Self::Discarded => "D",
        }
    }
}

impl std::fmt::Display for ReviewRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Submitted => write!(f, "submitted"),
            Self::Discarded => write!(f, "discarded"),
        }
    }
}

/// The unit of work under review.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewRequest {
    pub id: i64,

    /// Owner of the change.
    pub submitter_id: i64,

    pub repository_id: Option<i64>,
    pub local_site_id: Option<i64>,

    pub summary: String,

    /// Whether the request has been published.
    pub public: bool,

    /// Status code: `P`, `S` or `D`.
    pub status: String,

    /// Number of published, non-revoked Ship It! reviews.
    pub shipit_count: i64,

    /// Creation timestamp (Unix).
    pub time_added: i64,

    /// Last published activity (Unix).
    pub last_updated: i64,
}

impl ReviewRequest {
    pub fn status_enum(&self) -> ReviewRequestStatus {
        ReviewRequestStatus::from(self.status.as_str())
    }

    /// Whether the viewer can see this review request.
    ///
    /// `repository` and `local_site` must be the records this request
    /// points at, when it points at any.
    pub fn is_accessible_by(
        &self,
        viewer: Option<&User>,
        repository: Option<&Repository>,
        local_site: Option<&LocalSite>,
    ) -> bool {
        if let Some(user) = viewer {
            if user.is_superuser || user.id == self.submitter_id {
                return true;
            }
        }

        if let Some(site) = local_site {
            if !site.is_accessible_by(viewer) {
                return false;
            }
        }

        if !self.public {
            return false;
        }

        repository.is_none_or(|repo| repo.is_accessible_by(viewer))
    }

    /// Whether the viewer may see and change this request's drafts: the
    /// submitter, superusers and admins of its local site.
    pub fn is_mutable_by(&self, viewer: Option<&User>, local_site: Option<&LocalSite>) -> bool {
        viewer.is_some_and(|user| {
            user.id == self.submitter_id
                || user.is_superuser
                || local_site.is_some_and(|site| site.is_mutable_by(viewer))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: String::new(),
            password_hash: String::new(),
            is_superuser: false,
            is_active: true,
            date_joined: 0,
        }
    }

    fn request(public: bool) -> ReviewRequest {
        ReviewRequest {
            id: 1,
            submitter_id: 1,
            repository_id: Some(1),
            local_site_id: None,
            summary: "Test".to_string(),
            public,
            status: "P".to_string(),
            shipit_count: 0,
            time_added: 0,
            last_updated: 0,
        }
    }

    fn repository(public: bool) -> Repository {
        Repository {
            id: 1,
            name: "repo".to_string(),
            path: "/tmp/repo".to_string(),
            public,
            local_site_id: None,
            users: vec![],
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ReviewRequestStatus::from("S"), ReviewRequestStatus::Submitted);
        assert_eq!(ReviewRequestStatus::from("?"), ReviewRequestStatus::Pending);
        assert_eq!(ReviewRequestStatus::Discarded.code(), "D");
        assert_eq!(ReviewRequestStatus::Submitted.to_string(), "submitted");
    }

    #[test]
    fn test_unpublished_hidden_from_others() {
        let rr = request(false);
        let repo = repository(true);
        assert!(!rr.is_accessible_by(Some(&user(2)), Some(&repo), None));
        assert!(rr.is_accessible_by(Some(&user(1)), Some(&repo), None));
    }

    #[test]
    fn test_private_repository_restricts_access() {
        let rr = request(true);
        let mut repo = repository(false);
        assert!(!rr.is_accessible_by(Some(&user(2)), Some(&repo), None));
        assert!(!rr.is_accessible_by(None, Some(&repo), None));

        repo.users.push(2);
        assert!(rr.is_accessible_by(Some(&user(2)), Some(&repo), None));
    }

    #[test]
    fn test_published_public_open_to_anonymous() {
        assert!(request(true).is_accessible_by(None, Some(&repository(true)), None));
    }

    #[test]
    fn test_is_mutable_by() {
        let rr = request(true);
        let mut admin = user(3);
        let site = LocalSite {
            id: 1,
            name: "local-site-1".to_string(),
            public: false,
            users: vec![],
            admins: vec![3],
        };

        assert!(rr.is_mutable_by(Some(&user(1)), None));
        assert!(!rr.is_mutable_by(Some(&user(2)), None));
        assert!(!rr.is_mutable_by(None, None));
        assert!(!rr.is_mutable_by(Some(&admin), None));
        assert!(rr.is_mutable_by(Some(&admin), Some(&site)));

        admin.id = 4;
        admin.is_superuser = true;
        assert!(rr.is_mutable_by(Some(&admin), None));
    }
}
