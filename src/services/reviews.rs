//! Review business rules that need storage.
//!
//! Pure checks live on `models::Review`; the functions here load whatever
//! related records a rule needs and persist the results of state changes.

use crate::db::pool::DbPool;
use crate::db::{self, comments, local_sites, repositories, review_requests, reviews, users};
use crate::error::AppError;
use crate::models::{LocalSite, Repository, Review, ReviewRequest, User};
use crate::services::review_signals::{ReviewEvent, ReviewEventKind, ReviewSignals};
use std::collections::HashSet;
use thiserror::Error;

/// Reasons a Ship It! revocation can fail.
#[derive(Debug, Error)]
pub enum RevokeShipItError {
    #[error("This review is not marked Ship It!")]
    NotShipIt,

    /// A `ShipItRevoking` listener vetoed the revocation.
    #[error("Error revoking the Ship It: {0}")]
    Listener(String),

    #[error("Error revoking the Ship It: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Error revoking the Ship It: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RevokeShipItError> for AppError {
    fn from(err: RevokeShipItError) -> Self {
        match err {
            RevokeShipItError::Database(e) => AppError::database_with_op(e.to_string(), "revoke_ship_it"),
            other => AppError::invalid_field("ship_it", other.to_string()),
        }
    }
}

/// Outcome of a publish eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishEligibility {
    Allowed,
    /// Publishing is blocked; the message explains why.
    Blocked(String),
}

impl PublishEligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allowed => None,
            Self::Blocked(reason) => Some(reason),
        }
    }
}

pub const UNPUBLISHED_REVIEW_REQUEST_ERROR: &str =
    "This review cannot be published until the review request is published.";
pub const DRAFT_DIFF_COMMENT_ERROR: &str = "This review cannot be published, because it includes \
     a comment on a diff which has not yet been published.";
pub const DRAFT_FILE_ATTACHMENT_COMMENT_ERROR: &str = "This review cannot be published, because \
     it includes a comment on a file attachment which has not yet been published.";

/// The records a review's permission checks depend on.
#[derive(Debug, Clone)]
pub struct ReviewContext {
    pub review_request: ReviewRequest,
    pub repository: Option<Repository>,
    pub local_site: Option<LocalSite>,
}

impl ReviewContext {
    pub fn review_request_accessible_by(&self, viewer: Option<&User>) -> bool {
        self.review_request.is_accessible_by(
            viewer,
            self.repository.as_ref(),
            self.local_site.as_ref(),
        )
    }

    pub fn review_accessible_by(&self, review: &Review, viewer: Option<&User>) -> bool {
        review.is_accessible_by(
            viewer,
            self.review_request_accessible_by(viewer),
            self.local_site.as_ref(),
        )
    }

    pub fn review_mutable_by(&self, review: &Review, viewer: Option<&User>) -> bool {
        review.is_mutable_by(viewer, self.local_site.as_ref())
    }

    pub fn can_revoke_ship_it(&self, review: &Review, viewer: Option<&User>) -> bool {
        review.can_user_revoke_ship_it(viewer, self.local_site.as_ref())
    }

    pub fn is_ship_it_authority(&self, review: &Review, user: &User) -> bool {
        review.is_ship_it_authority(user, self.local_site.as_ref())
    }
}

/// Load the review request, repository and local site behind a review.
pub async fn load_context(pool: &DbPool, review: &Review) -> Result<ReviewContext, AppError> {
    let review_request = review_requests::get_review_request(pool, review.review_request_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("ReviewRequest", review.review_request_id))?;

    let repository = match review_request.repository_id {
        Some(id) => repositories::get_repository(pool, id).await?,
        None => None,
    };

    let local_site = local_sites::get_optional(pool, review_request.local_site_id).await?;

    Ok(ReviewContext {
        review_request,
        repository,
        local_site,
    })
}

/// Whether the viewer may read the review.
pub async fn is_accessible_by(
    pool: &DbPool,
    review: &Review,
    viewer: Option<&User>,
) -> Result<bool, AppError> {
    let context = load_context(pool, review).await?;
    Ok(context.review_accessible_by(review, viewer))
}

/// Everyone taking part in a review's discussion: the owner plus the
/// authors of its public replies.
pub async fn all_participants(pool: &DbPool, review: &Review) -> Result<HashSet<User>, AppError> {
    let owner = users::get_user(pool, review.user_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("User", review.user_id))?;

    let mut participants: HashSet<User> = users::get_public_reply_authors(pool, review.id)
        .await?
        .into_iter()
        .collect();
    participants.insert(owner);

    Ok(participants)
}

/// Check whether a draft review could be published right now.
pub async fn can_publish(pool: &DbPool, review: &Review) -> Result<PublishEligibility, AppError> {
    let review_request = review_requests::get_review_request(pool, review.review_request_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("ReviewRequest", review.review_request_id))?;

    if !review_request.public {
        return Ok(PublishEligibility::Blocked(
            UNPUBLISHED_REVIEW_REQUEST_ERROR.to_string(),
        ));
    }

    if comments::has_draft_diff_comments(pool, review.id).await? {
        return Ok(PublishEligibility::Blocked(DRAFT_DIFF_COMMENT_ERROR.to_string()));
    }

    if comments::has_draft_file_attachment_comments(pool, review.id).await? {
        return Ok(PublishEligibility::Blocked(
            DRAFT_FILE_ATTACHMENT_COMMENT_ERROR.to_string(),
        ));
    }

    Ok(PublishEligibility::Allowed)
}

/// Revoke a review's Ship It!.
///
/// Permission is the caller's concern (see `Review::can_user_revoke_ship_it`).
/// A failing `ShipItRevoking` listener aborts with nothing changed, in
/// memory or in storage. The review and its review request's Ship It! count
/// are updated together, and only while the stored review is still a Ship
/// It!; a stale copy whose review was already revoked gets `NotShipIt`.
/// `ShipItRevoked` listener failures are logged; the revocation is already
/// committed by then.
pub async fn revoke_ship_it(
    pool: &DbPool,
    review: &mut Review,
    user: &User,
    signals: &ReviewSignals,
) -> Result<(), RevokeShipItError> {
    if !review.ship_it {
        return Err(RevokeShipItError::NotShipIt);
    }

    signals
        .send(&ReviewEvent {
            kind: ReviewEventKind::ShipItRevoking,
            user,
            review,
        })
        .map_err(|e| RevokeShipItError::Listener(e.to_string()))?;

    let mut revoked = review.clone();
    revoked.apply_ship_it_revocation()?;

    if !reviews::save_ship_it_revocation(pool, &revoked).await? {
        return Err(RevokeShipItError::NotShipIt);
    }

    *review = revoked;

    log::info!(
        "[reviews] Ship It! on review {} revoked by {}",
        review.id,
        user.username
    );

    signals.send_robust(&ReviewEvent {
        kind: ReviewEventKind::ShipItRevoked,
        user,
        review,
    });

    Ok(())
}

/// Publish a draft review.
///
/// Publishing a Ship It! counts it on the review request; any publish
/// bumps the review request's `last_updated`.
pub async fn publish(
    pool: &DbPool,
    review: &mut Review,
    user: &User,
    signals: &ReviewSignals,
) -> Result<(), AppError> {
    if review.public {
        return Err(AppError::publish("This review is already published."));
    }

    if let PublishEligibility::Blocked(reason) = can_publish(pool, review).await? {
        return Err(AppError::publish(reason));
    }

    let now = db::now();
    let mut published = review.clone();
    published.public = true;
    published.timestamp = now;

    reviews::save_review(pool, &published).await?;

    if published.ship_it && !published.is_reply() {
        review_requests::increment_shipit_count(pool, published.review_request_id, now).await?;
    } else {
        review_requests::touch(pool, published.review_request_id, now).await?;
    }

    *review = published;

    log::info!("[reviews] Review {} published by {}", review.id, user.username);

    signals.send_robust(&ReviewEvent {
        kind: ReviewEventKind::Published,
        user,
        review,
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_eligibility_accessors() {
        assert!(PublishEligibility::Allowed.is_allowed());
        assert_eq!(PublishEligibility::Allowed.reason(), None);

        let blocked = PublishEligibility::Blocked("nope".to_string());
        assert!(!blocked.is_allowed());
        assert_eq!(blocked.reason(), Some("nope"));
    }

    #[test]
    fn test_revoke_error_messages() {
        assert_eq!(
            RevokeShipItError::NotShipIt.to_string(),
            "This review is not marked Ship It!"
        );
        assert_eq!(
            RevokeShipItError::Listener("oh no".to_string()).to_string(),
            "Error revoking the Ship It: oh no"
        );
    }

    #[test]
    fn test_revoke_error_maps_to_ship_it_field() {
        let err = AppError::from(RevokeShipItError::NotShipIt);
        assert_eq!(
            err.field_errors().and_then(|f| f.get("ship_it")).map(String::as_str),
            Some("This review is not marked Ship It!")
        );
    }
}
