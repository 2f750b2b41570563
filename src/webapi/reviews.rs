//! Review resource.
//!
//! `GET/PUT /api/review-requests/{review_request_id}/reviews/{review_id}/`
//! and `GET .../participants/`.

use super::auth::RequestUser;
use super::errors::ApiErr;
use super::fields::{bind_fields, parse_body, FieldSpec, FieldType};
use super::{resolve_local_site, AppState};
use crate::db::{reviews as review_queries, users};
use crate::error::AppError;
use crate::models::{to_iso8601, Review, User};
use crate::services::reviews::{self, PublishEligibility, ReviewContext};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const POLICY_ID: &str = "review";

const UPDATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::optional("ship_it", FieldType::Boolean),
    FieldSpec::optional("public", FieldType::Boolean),
    FieldSpec::optional("body_top", FieldType::String),
    FieldSpec::optional("body_bottom", FieldType::String),
];

#[derive(Deserialize)]
struct ReviewPath {
    local_site: Option<String>,
    review_request_id: i64,
    review_id: i64,
}

/// Serialized form of a review.
#[derive(Debug, Serialize)]
pub struct ReviewPayload {
    pub id: i64,
    pub user: String,
    pub ship_it: bool,
    pub public: bool,
    pub body_top: String,
    pub body_bottom: String,
    pub timestamp: String,
    pub extra_data: Value,
}

impl ReviewPayload {
    fn new(review: &Review, owner: &User) -> Self {
        Self {
            id: review.id,
            user: owner.username.clone(),
            ship_it: review.ship_it,
            public: review.public,
            body_top: review.body_top.clone(),
            body_bottom: review.body_bottom.clone(),
            timestamp: to_iso8601(review.timestamp),
            extra_data: Value::Object(review.extra_data_map()),
        }
    }
}

/// Build the review routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/review-requests/{review_request_id}/reviews/{review_id}/",
            get(get_review).put(update_review),
        )
        .route(
            "/review-requests/{review_request_id}/reviews/{review_id}/participants/",
            get(get_participants),
        )
}

/// Load the review named in the URL and check the caller may read it.
async fn load_review(
    state: &AppState,
    request_user: &RequestUser,
    method: &Method,
    path: &ReviewPath,
) -> Result<(Review, ReviewContext), AppError> {
    let site = resolve_local_site(state, request_user, path.local_site.as_deref()).await?;
    request_user.check_policy(POLICY_ID, method, Some(&path.review_id.to_string()))?;

    let review = review_queries::get_review(&state.db, path.review_id)
        .await?
        .filter(|r| r.review_request_id == path.review_request_id)
        .ok_or_else(|| AppError::not_found_with_id("Review", path.review_id))?;

    let context = reviews::load_context(&state.db, &review).await?;
    if context.review_request.local_site_id != site.map(|s| s.id) {
        return Err(AppError::not_found_with_id("Review", path.review_id));
    }

    if !context.review_accessible_by(&review, request_user.viewer()) {
        return Err(request_user.denied());
    }

    Ok((review, context))
}

async fn review_response(state: &AppState, review: &Review) -> Result<Response, AppError> {
    let owner = users::get_user(&state.db, review.user_id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("User", review.user_id))?;

    Ok(Json(json!({
        "stat": "ok",
        "review": ReviewPayload::new(review, &owner),
    }))
    .into_response())
}

async fn get_review(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    method: Method,
    Path(path): Path<ReviewPath>,
) -> Result<Response, ApiErr> {
    let (review, _) = load_review(&state, &request_user, &method, &path).await?;
    Ok(review_response(&state, &review).await?)
}

/// PUT: edit a draft, publish it, or revoke a published Ship It!.
///
/// A published review accepts only `ship_it=false` (revocation) and a
/// redundant `public=true`.
async fn update_review(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    method: Method,
    Path(path): Path<ReviewPath>,
    body: Bytes,
) -> Result<Response, ApiErr> {
    let viewer = request_user.require_login()?.clone();
    let (mut review, context) = load_review(&state, &request_user, &method, &path).await?;
    let fields = bind_fields(&parse_body(&body)?, UPDATE_FIELDS, false)?;

    let ship_it = fields.boolean("ship_it");
    let public = fields.boolean("public");
    let body_top = fields.string("body_top");
    let body_bottom = fields.string("body_bottom");

    if review.public {
        if body_top.is_some() || body_bottom.is_some() || ship_it == Some(true) || public == Some(false)
        {
            return Err(AppError::permission_denied(
                "This review is already published and can no longer be changed.",
            )
            .into());
        }

        if ship_it == Some(false) {
            if !context.is_ship_it_authority(&review, &viewer) {
                return Err(request_user.denied().into());
            }

            reviews::revoke_ship_it(&state.db, &mut review, &viewer, &state.signals).await?;
        }

        return Ok(review_response(&state, &review).await?);
    }

    if !context.review_mutable_by(&review, Some(&viewer)) {
        return Err(request_user.denied().into());
    }

    if public == Some(true) {
        if let PublishEligibility::Blocked(reason) = reviews::can_publish(&state.db, &review).await? {
            return Err(AppError::publish(reason).into());
        }
    }

    let mut changed = false;
    if let Some(ship_it) = ship_it {
        changed |= review.ship_it != ship_it;
        review.ship_it = ship_it;
    }
    if let Some(body_top) = body_top {
        changed |= review.body_top != body_top;
        review.body_top = body_top;
    }
    if let Some(body_bottom) = body_bottom {
        changed |= review.body_bottom != body_bottom;
        review.body_bottom = body_bottom;
    }

    if changed {
        review_queries::save_review(&state.db, &review).await?;
    }

    if public == Some(true) {
        reviews::publish(&state.db, &mut review, &viewer, &state.signals).await?;
    }

    Ok(review_response(&state, &review).await?)
}

/// GET: usernames of everyone taking part in the review, sorted.
async fn get_participants(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    method: Method,
    Path(path): Path<ReviewPath>,
) -> Result<Response, ApiErr> {
    let (review, _) = load_review(&state, &request_user, &method, &path).await?;

    let mut participants: Vec<String> = reviews::all_participants(&state.db, &review)
        .await?
        .into_iter()
        .map(|u| u.username)
        .collect();
    participants.sort();

    Ok(Json(json!({
        "stat": "ok",
        "total_results": participants.len(),
        "participants": participants,
    }))
    .into_response())
}
