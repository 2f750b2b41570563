//! API token resource.
//!
//! `/api/users/{username}/api-tokens/` and
//! `/api/users/{username}/api-tokens/{api_token_id}/`, plus the same paths
//! under `/s/{local_site}/`.
//!
//! Tokens can only be managed with a password-authenticated session; a
//! request authenticated by an API token is always refused.

use super::auth::RequestUser;
use super::errors::ApiErr;
use super::fields::{bind_fields, parse_body, FieldSpec, FieldType};
use super::{resolve_local_site, AppState};
use crate::db::{self, api_tokens as token_queries, users};
use crate::error::AppError;
use crate::models::{to_iso8601, LocalSite, User, WebApiToken};
use crate::services::api_tokens::{self, CreateToken, UpdateToken};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const CREATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("note", FieldType::String),
    FieldSpec::required("policy", FieldType::Json),
    FieldSpec::optional("expires", FieldType::DateTime),
];

const UPDATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::optional("note", FieldType::String),
    FieldSpec::optional("policy", FieldType::Json),
    FieldSpec::optional("expires", FieldType::DateTime),
    FieldSpec::optional("valid", FieldType::Boolean),
    FieldSpec::optional("invalid_reason", FieldType::String),
];

#[derive(Deserialize)]
struct ListPath {
    local_site: Option<String>,
    username: String,
}

#[derive(Deserialize)]
struct ItemPath {
    local_site: Option<String>,
    username: String,
    api_token_id: String,
}

/// Serialized form of a token.
#[derive(Debug, Serialize)]
pub struct ApiTokenPayload {
    pub id: i64,
    pub token: String,
    pub token_generator_id: String,
    pub note: String,
    pub policy: Value,
    pub extra_data: Value,
    pub valid: bool,
    pub invalid_reason: String,
    pub invalid_date: Option<String>,
    pub expires: Option<String>,
    pub expired: bool,
    pub last_used: Option<String>,
    pub last_updated: String,
    pub time_added: String,
}

impl From<WebApiToken> for ApiTokenPayload {
    fn from(token: WebApiToken) -> Self {
        let expired = token.is_expired(db::now());
        Self {
            id: token.id,
            policy: Value::Object(token.policy_map()),
            extra_data: Value::Object(token.extra_data_map()),
            expires: token.expires_iso(),
            expired,
            invalid_date: token.invalid_date.map(to_iso8601),
            last_used: token.last_used.map(to_iso8601),
            last_updated: to_iso8601(token.last_updated),
            time_added: to_iso8601(token.time_added),
            token: token.token,
            token_generator_id: token.token_generator_id,
            note: token.note,
            valid: token.valid,
            invalid_reason: token.invalid_reason,
        }
    }
}

/// Build the API token routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/{username}/api-tokens/",
            get(get_list).post(create),
        )
        .route(
            "/users/{username}/api-tokens/{api_token_id}/",
            get(get_item).put(update).delete(delete_item),
        )
}

/// Shared checks for every token request. Returns the local site, the
/// caller and the user named in the URL.
async fn resolve_owner(
    state: &AppState,
    request_user: &RequestUser,
    local_site: Option<&str>,
    username: &str,
) -> Result<(Option<LocalSite>, User), AppError> {
    let site = resolve_local_site(state, request_user, local_site).await?;
    let viewer = request_user.require_login()?;

    if request_user.is_token_auth() {
        return Err(AppError::permission_denied(
            "API tokens cannot be managed using API token authentication.",
        ));
    }

    let owner = users::get_user_by_username(&state.db, username)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("User", username))?;

    if !(viewer.is_superuser || viewer.id == owner.id) {
        return Err(AppError::permission_denied(
            "You don't have permission to access this user's API tokens.",
        ));
    }

    Ok((site, owner))
}

async fn load_token(
    state: &AppState,
    site: Option<&LocalSite>,
    owner: &User,
    api_token_id: &str,
) -> Result<WebApiToken, AppError> {
    let id: i64 = api_token_id
        .parse()
        .map_err(|_| AppError::not_found_with_id("WebApiToken", api_token_id))?;

    token_queries::get_user_token(&state.db, id, owner.id, site.map(|s| s.id))
        .await?
        .ok_or_else(|| AppError::not_found_with_id("WebApiToken", id))
}

fn item_response(status: StatusCode, token: WebApiToken) -> Response {
    (
        status,
        Json(json!({
            "stat": "ok",
            "api_token": ApiTokenPayload::from(token),
        })),
    )
        .into_response()
}

/// GET: list the user's tokens in this local site.
async fn get_list(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    Path(path): Path<ListPath>,
) -> Result<Response, ApiErr> {
    let (site, owner) =
        resolve_owner(&state, &request_user, path.local_site.as_deref(), &path.username).await?;

    let tokens = token_queries::list_user_tokens(&state.db, owner.id, site.map(|s| s.id)).await?;
    let total_results = tokens.len();
    let api_tokens: Vec<ApiTokenPayload> = tokens.into_iter().map(Into::into).collect();

    Ok(Json(json!({
        "stat": "ok",
        "api_tokens": api_tokens,
        "total_results": total_results,
    }))
    .into_response())
}

/// POST: create a token.
async fn create(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    Path(path): Path<ListPath>,
    body: Bytes,
) -> Result<Response, ApiErr> {
    let (site, owner) =
        resolve_owner(&state, &request_user, path.local_site.as_deref(), &path.username).await?;

    let fields = bind_fields(&parse_body(&body)?, CREATE_FIELDS, true)?;

    let request = CreateToken {
        user_id: owner.id,
        local_site_id: site.map(|s| s.id),
        note: fields.string("note").unwrap_or_default(),
        policy: fields.json("policy").unwrap_or_default(),
        expires: fields.datetime("expires").flatten(),
        extra_fields: fields.extra_data,
    };

    let token = api_tokens::create_token(
        &state.db,
        &state.tokens,
        state.settings.token_generation_attempts,
        request,
    )
    .await?;

    Ok(item_response(StatusCode::CREATED, token))
}

/// GET: one token.
async fn get_item(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    Path(path): Path<ItemPath>,
) -> Result<Response, ApiErr> {
    let (site, owner) =
        resolve_owner(&state, &request_user, path.local_site.as_deref(), &path.username).await?;
    let token = load_token(&state, site.as_ref(), &owner, &path.api_token_id).await?;

    if !token.is_accessible_by(request_user.viewer()) {
        return Err(request_user.denied().into());
    }

    Ok(item_response(StatusCode::OK, token))
}

/// PUT: change a token or invalidate it.
async fn update(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    Path(path): Path<ItemPath>,
    body: Bytes,
) -> Result<Response, ApiErr> {
    let (site, owner) =
        resolve_owner(&state, &request_user, path.local_site.as_deref(), &path.username).await?;
    let token = load_token(&state, site.as_ref(), &owner, &path.api_token_id).await?;

    if !token.is_mutable_by(request_user.viewer()) {
        return Err(request_user.denied().into());
    }

    let fields = bind_fields(&parse_body(&body)?, UPDATE_FIELDS, true)?;

    let request = UpdateToken {
        note: fields.string("note"),
        policy: fields.json("policy"),
        expires: fields.datetime("expires"),
        valid: fields.boolean("valid"),
        invalid_reason: fields.string("invalid_reason"),
        extra_fields: fields.extra_data,
    };

    let updated = api_tokens::update_token(&state.db, &token, request).await?;
    Ok(item_response(StatusCode::OK, updated))
}

/// DELETE: remove a token.
async fn delete_item(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    Path(path): Path<ItemPath>,
) -> Result<Response, ApiErr> {
    let (site, owner) =
        resolve_owner(&state, &request_user, path.local_site.as_deref(), &path.username).await?;
    let token = load_token(&state, site.as_ref(), &owner, &path.api_token_id).await?;

    if !token.is_deletable_by(request_user.viewer()) {
        return Err(request_user.denied().into());
    }

    token_queries::delete_token(&state.db, token.id).await?;
    log::info!("[tokens] Deleted API token {} of user {}", token.id, owner.username);

    Ok(StatusCode::NO_CONTENT.into_response())
}
