//! Review model and the rules that only need the review itself.

use super::local_site::LocalSite;
use super::user::User;
use super::{parse_json_object, to_datetime};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::FromRow;

/// A reviewer's critique of a review request, or a reply to one.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: i64,

    pub review_request_id: i64,

    /// Author of the review.
    pub user_id: i64,

    /// Parent review when this is a reply.
    pub base_reply_to_id: Option<i64>,

    /// Published reviews are visible to everyone who can see the request.
    pub public: bool,

    pub ship_it: bool,

    /// Text shown above the comments (Markdown).
    pub body_top: String,

    /// Text shown below the comments (Markdown).
    pub body_bottom: String,

    /// Creation or publish timestamp (Unix).
    pub timestamp: i64,

    /// JSON object of extension-defined data.
    pub extra_data: String,
}

impl Review {
    /// Body text used for a plain Ship It! review.
    pub const SHIP_IT_TEXT: &'static str = "Ship It!";

    /// Body text substituted when a plain Ship It! is revoked.
    pub const REVOKED_SHIP_IT_TEXT: &'static str = "~~Ship It!~~";

    /// `extra_data` key recording a revocation.
    pub const REVOKED_SHIP_IT_KEY: &'static str = "revoked_ship_it";

    pub fn is_reply(&self) -> bool {
        self.base_reply_to_id.is_some()
    }

    pub fn timestamp_datetime(&self) -> DateTime<Utc> {
        to_datetime(self.timestamp)
    }

    pub fn extra_data_map(&self) -> Map<String, Value> {
        parse_json_object(&self.extra_data)
    }

    /// Whether the viewer may read this review.
    ///
    /// `review_request_accessible` is the parent request's own verdict for
    /// the same viewer.
    pub fn is_accessible_by(
        &self,
        viewer: Option<&User>,
        review_request_accessible: bool,
        local_site: Option<&LocalSite>,
    ) -> bool {
        review_request_accessible && (self.public || self.is_mutable_by(viewer, local_site))
    }

    /// Whether the viewer may modify this review.
    ///
    /// Owners lose the right once the review is published; superusers and
    /// local site administrators keep it.
    pub fn is_mutable_by(&self, viewer: Option<&User>, local_site: Option<&LocalSite>) -> bool {
        let Some(user) = viewer else {
            return false;
        };

        if user.is_superuser || local_site.is_some_and(|site| site.is_mutable_by(viewer)) {
            return true;
        }

        !self.public && user.id == self.user_id
    }

    /// Whether the review has activity the user has not seen yet.
    pub fn is_new_for_user(&self, user: &User, last_visited: DateTime<Utc>) -> bool {
        user.id != self.user_id && self.timestamp_datetime() > last_visited
    }

    /// Whether the viewer may revoke this review's Ship It!.
    pub fn can_user_revoke_ship_it(
        &self,
        viewer: Option<&User>,
        local_site: Option<&LocalSite>,
    ) -> bool {
        let Some(user) = viewer else {
            return false;
        };

        if !self.public || !self.ship_it {
            return false;
        }

        self.is_ship_it_authority(user, local_site)
    }

    /// Whether the user may revoke this review's Ship It! once it has one:
    /// its owner, a superuser or an admin of its local site.
    pub fn is_ship_it_authority(&self, user: &User, local_site: Option<&LocalSite>) -> bool {
        user.id == self.user_id
            || user.is_superuser
            || local_site.is_some_and(|site| site.is_mutable_by(Some(user)))
    }

    /// Apply the field changes of a Ship It! revocation in memory.
    ///
    /// Custom body text is preserved; only the stock text is struck out.
    pub fn apply_ship_it_revocation(&mut self) -> Result<(), serde_json::Error> {
        let mut extra_data = self.extra_data_map();
        extra_data.insert(Self::REVOKED_SHIP_IT_KEY.to_string(), Value::Bool(true));

        self.extra_data = serde_json::to_string(&extra_data)?;
        self.ship_it = false;

        if self.body_top == Self::SHIP_IT_TEXT {
            self.body_top = Self::REVOKED_SHIP_IT_TEXT.to_string();
        }

        Ok(())
    }
}
