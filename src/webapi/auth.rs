//! Request authentication.
//!
//! The middleware resolves the `Authorization` header to a user and stores
//! a `RequestUser` in the request extensions. Missing credentials yield an
//! anonymous `RequestUser`; each handler decides whether that is enough.
//!
//! Supported schemes:
//!
//! - `Basic <base64 username:password>`
//! - `token <api token>`

use super::errors::ApiErr;
use super::AppState;
use crate::db::users;
use crate::error::AppError;
use crate::models::{User, WebApiToken};
use crate::services::api_tokens;
use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Who is making the request.
#[derive(Debug, Clone, Default)]
pub struct RequestUser {
    pub user: Option<User>,

    /// Set when the request authenticated with an API token.
    pub token: Option<WebApiToken>,
}

impl RequestUser {
    pub fn viewer(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The authenticated user, or `NOT_LOGGED_IN`.
    pub fn require_login(&self) -> Result<&User, AppError> {
        self.user.as_ref().ok_or(AppError::NotLoggedIn)
    }

    pub fn is_token_auth(&self) -> bool {
        self.token.is_some()
    }

    /// Check the authenticating token's policy, if any.
    pub fn check_policy(
        &self,
        policy_id: &str,
        method: &Method,
        object_id: Option<&str>,
    ) -> Result<(), AppError> {
        match &self.token {
            Some(token) if !token.allows(policy_id, method.as_str(), object_id) => {
                log::info!(
                    "[webapi] API token {} blocked by policy: {} {}{}",
                    token.id,
                    method,
                    policy_id,
                    object_id.map(|id| format!(" {}", id)).unwrap_or_default()
                );
                Err(AppError::permission_denied(
                    "This API token's policy does not allow this request.",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Access denied for this caller: `NOT_LOGGED_IN` when anonymous,
    /// `PERMISSION_DENIED` otherwise.
    pub fn denied(&self) -> AppError {
        if self.user.is_some() {
            AppError::permission_denied("You don't have permission for this")
        } else {
            AppError::NotLoggedIn
        }
    }
}

enum Credentials {
    Basic { username: String, password: String },
    Token(String),
}

fn parse_authorization(value: &str) -> Result<Credentials, AppError> {
    let (scheme, rest) = value.trim().split_once(' ').ok_or(AppError::NotLoggedIn)?;
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD.decode(rest).map_err(|_| AppError::NotLoggedIn)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AppError::NotLoggedIn)?;
        let (username, password) = decoded.split_once(':').ok_or(AppError::NotLoggedIn)?;

        Ok(Credentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    } else if scheme.eq_ignore_ascii_case("token") && !rest.is_empty() {
        Ok(Credentials::Token(rest.to_string()))
    } else {
        Err(AppError::NotLoggedIn)
    }
}

async fn authenticate(state: &AppState, credentials: Credentials) -> Result<RequestUser, AppError> {
    match credentials {
        Credentials::Basic { username, password } => {
            let user = users::get_user_by_username(&state.db, &username)
                .await?
                .filter(|u| u.is_active && u.check_password(&password));

            match user {
                Some(user) => Ok(RequestUser {
                    user: Some(user),
                    token: None,
                }),
                None => {
                    log::info!("[webapi] Failed login for \"{}\"", username);
                    Err(AppError::NotLoggedIn)
                }
            }
        }
        Credentials::Token(value) => {
            match api_tokens::authenticate(&state.db, &state.tokens, &value).await? {
                Some((user, token)) => Ok(RequestUser {
                    user: Some(user),
                    token: Some(token),
                }),
                None => {
                    log::info!("[webapi] Rejected API token authentication");
                    Err(AppError::NotLoggedIn)
                }
            }
        }
    }
}

/// axum middleware that resolves the caller and stores a `RequestUser`.
///
/// Bad credentials are rejected with 401; no credentials pass through as
/// anonymous.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request_user = match header_value {
        None => RequestUser::default(),
        Some(value) => {
            let resolved = match parse_authorization(&value) {
                Ok(credentials) => authenticate(&state, credentials).await,
                Err(e) => Err(e),
            };

            match resolved {
                Ok(request_user) => request_user,
                Err(e) => return ApiErr(e).into_response(),
            }
        }
    };

    request.extensions_mut().insert(request_user);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let value = format!("Basic {}", STANDARD.encode("doc:pass:word"));
        match parse_authorization(&value).unwrap() {
            Credentials::Basic { username, password } => {
                assert_eq!(username, "doc");
                assert_eq!(password, "pass:word");
            }
            Credentials::Token(_) => panic!("expected basic credentials"),
        }
    }

    #[test]
    fn test_parse_token() {
        match parse_authorization("token rbp_abc").unwrap() {
            Credentials::Token(value) => assert_eq!(value, "rbp_abc"),
            Credentials::Basic { .. } => panic!("expected token credentials"),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_authorization("Bearer").is_err());
        assert!(parse_authorization("Digest abc").is_err());
        assert!(parse_authorization("Basic !!!").is_err());
        assert!(parse_authorization("token ").is_err());
    }

    #[test]
    fn test_anonymous_denied_is_not_logged_in() {
        assert!(matches!(RequestUser::default().denied(), AppError::NotLoggedIn));
        assert!(RequestUser::default()
            .check_policy("review", &Method::PUT, Some("1"))
            .is_ok());
    }
}
