//! Source code repository model.

use super::user::User;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub path: String,

    /// Non-public repositories are limited to their access list.
    pub public: bool,

    pub local_site_id: Option<i64>,

    /// User IDs granted access to a non-public repository.
    #[sqlx(skip)]
    pub users: Vec<i64>,
}

impl Repository {
    pub fn is_accessible_by(&self, viewer: Option<&User>) -> bool {
        self.public || viewer.is_some_and(|u| u.is_superuser || self.users.contains(&u.id))
    }
}
