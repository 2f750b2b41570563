//! REST web API.
//!
//! Every resource is reachable both globally (`/api/...`) and inside a
//! local site (`/s/{local_site}/api/...`). Successful responses carry
//! `"stat": "ok"`; failures are rendered by `errors::ApiErr`.

pub mod api_tokens;
pub mod auth;
pub mod draft_filediffs;
pub mod errors;
pub mod fields;
pub mod reviews;

use crate::config::ServerSettings;
use crate::db::local_sites;
use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::LocalSite;
use crate::services::{ReviewSignals, TokenGeneratorRegistry};
use auth::RequestUser;
use axum::middleware;
use axum::response::IntoResponse;
use axum::Router;
use errors::ApiErr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared state for the web API's axum routes.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub tokens: Arc<TokenGeneratorRegistry>,
    pub signals: Arc<ReviewSignals>,
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    /// Build state with the default token generators, using the generator
    /// named in `settings` for new tokens.
    pub fn new(db: DbPool, settings: ServerSettings) -> Result<Self, AppError> {
        let mut tokens = TokenGeneratorRegistry::default();
        tokens.set_default(&settings.token_generator)?;

        Ok(Self {
            db,
            tokens: Arc::new(tokens),
            signals: Arc::new(ReviewSignals::new()),
            settings: Arc::new(settings),
        })
    }
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    let resources = || {
        api_tokens::routes()
            .merge(draft_filediffs::routes())
            .merge(reviews::routes())
    };

    Router::new()
        .nest("/api", resources())
        .nest("/s/{local_site}/api", resources())
        .fallback(|| async { ApiErr(AppError::not_found("Resource")).into_response() })
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolve the local site named in the URL and check the caller may use it.
///
/// Unknown sites are `DOES_NOT_EXIST`; inaccessible ones are denied.
pub(crate) async fn resolve_local_site(
    state: &AppState,
    request_user: &RequestUser,
    name: Option<&str>,
) -> Result<Option<LocalSite>, AppError> {
    let Some(name) = name else {
        return Ok(None);
    };

    let site = local_sites::get_local_site_by_name(&state.db, name)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("LocalSite", name))?;

    if !site.is_accessible_by(request_user.viewer()) {
        return Err(request_user.denied());
    }

    Ok(Some(site))
}
