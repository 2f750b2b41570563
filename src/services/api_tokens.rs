//! API token lifecycle: creation, updates, invalidation and authentication.

use crate::db::api_tokens::{self, TokenChanges};
use crate::db::pool::DbPool;
use crate::db::{self, users};
use crate::error::AppError;
use crate::models::token_policy;
use crate::models::{NewApiToken, User, WebApiToken};
use crate::services::token_generator::{TokenGenerationError, TokenGeneratorRegistry, TokenInfo};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default number of generation attempts before giving up on a unique value.
pub const DEFAULT_GENERATION_ATTEMPTS: u32 = 20;

pub const VALID_TRUE_ERROR: &str =
    "This can only be used to invalidate the token. You cannot set valid to true.";

/// A new token requested by a user.
#[derive(Debug, Clone, Default)]
pub struct CreateToken {
    pub user_id: i64,
    pub local_site_id: Option<i64>,
    pub note: String,
    /// Raw policy JSON as submitted.
    pub policy: String,
    pub expires: Option<i64>,
    /// `extra_data` keys to set; `null` or `""` values are skipped.
    pub extra_fields: BTreeMap<String, Value>,
}

/// Requested changes to an existing token. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct UpdateToken {
    pub note: Option<String>,
    pub policy: Option<String>,
    /// `Some(None)` removes the expiration.
    pub expires: Option<Option<i64>>,
    pub valid: Option<bool>,
    pub invalid_reason: Option<String>,
    /// `extra_data` keys to set; `null` or `""` deletes the key.
    pub extra_fields: BTreeMap<String, Value>,
}

impl UpdateToken {
    fn is_empty(&self) -> bool {
        self.note.is_none()
            && self.policy.is_none()
            && self.expires.is_none()
            && self.extra_fields.is_empty()
    }
}

/// Parse and validate a submitted policy, returning its normalized JSON.
pub fn parse_policy(raw: &str) -> Result<String, AppError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        AppError::invalid_field("policy", format!("The policy is not valid JSON: {}", e))
    })?;

    token_policy::validate_policy(&value).map_err(|e| AppError::invalid_field("policy", e))?;

    Ok(value.to_string())
}

/// Merge submitted `extra_data` fields into an existing map.
///
/// Keys starting with `__` are reserved. A `null` or empty-string value
/// removes the key.
pub fn apply_extra_fields(
    extra_data: &mut Map<String, Value>,
    fields: &BTreeMap<String, Value>,
) -> Result<(), AppError> {
    let mut errors = BTreeMap::new();

    for key in fields.keys().filter(|k| k.starts_with("__")) {
        errors.insert(
            format!("extra_data.{}", key),
            "Keys starting with \"__\" are reserved.".to_string(),
        );
    }

    if !errors.is_empty() {
        return Err(AppError::invalid_fields(errors));
    }

    for (key, value) in fields {
        match value {
            Value::Null => {
                extra_data.remove(key);
            }
            Value::String(s) if s.is_empty() => {
                extra_data.remove(key);
            }
            other => {
                extra_data.insert(key.clone(), other.clone());
            }
        }
    }

    Ok(())
}

/// Create a token with a freshly generated, unique value.
///
/// A value that collides with an existing token is discarded and a new one
/// generated, up to `max_attempts` times.
pub async fn create_token(
    pool: &DbPool,
    generators: &TokenGeneratorRegistry,
    max_attempts: u32,
    request: CreateToken,
) -> Result<WebApiToken, AppError> {
    let policy = parse_policy(&request.policy)?;

    let mut extra_data = Map::new();
    apply_extra_fields(&mut extra_data, &request.extra_fields)?;
    let extra_data = Value::Object(extra_data).to_string();

    let generator = generators.get_default()?;
    let info = TokenInfo::default();

    for attempt in 1..=max_attempts {
        let input = NewApiToken {
            user_id: request.user_id,
            local_site_id: request.local_site_id,
            token: generator.create_token(&info)?,
            token_generator_id: generator.id().to_string(),
            note: request.note.clone(),
            policy: policy.clone(),
            expires: request.expires,
            extra_data: extra_data.clone(),
        };

        match api_tokens::insert_token(pool, &input).await {
            Ok(token) => {
                log::info!(
                    "[tokens] Created API token {} for user {} ({})",
                    token.id,
                    token.user_id,
                    token.token_generator_id
                );
                return Ok(token);
            }
            Err(e) if api_tokens::is_unique_violation(&e) => {
                log::warn!(
                    "[tokens] Generated token collided with an existing one (attempt {}/{})",
                    attempt,
                    max_attempts
                );
            }
            Err(e) => return Err(AppError::database_with_op(e.to_string(), "create_token")),
        }
    }

    log::error!(
        "[tokens] Giving up on token for user {} after {} attempts",
        request.user_id,
        max_attempts
    );
    Err(TokenGenerationError::Exhausted {
        attempts: max_attempts,
    }
    .into())
}

/// Apply an update to a token.
///
/// `valid` may only move to `false`. All input is checked before anything
/// is written.
pub async fn update_token(
    pool: &DbPool,
    token: &WebApiToken,
    request: UpdateToken,
) -> Result<WebApiToken, AppError> {
    if request.valid == Some(true) {
        return Err(AppError::invalid_field("valid", VALID_TRUE_ERROR));
    }

    let policy = request.policy.as_deref().map(parse_policy).transpose()?;

    let extra_data = if request.extra_fields.is_empty() {
        None
    } else {
        let mut map = token.extra_data_map();
        apply_extra_fields(&mut map, &request.extra_fields)?;
        Some(Value::Object(map).to_string())
    };

    let mut updated = token.clone();

    if !request.is_empty() {
        let changes = TokenChanges {
            note: request.note,
            policy,
            expires: request.expires,
            extra_data,
        };
        updated = api_tokens::update_token(pool, token.id, &changes).await?;
    }

    if request.valid == Some(false) {
        let reason = request.invalid_reason.unwrap_or_default();
        if invalidate(pool, &token.token, &reason).await? {
            updated = api_tokens::get_by_value(pool, &token.token)
                .await?
                .ok_or_else(|| AppError::not_found_with_id("WebApiToken", token.id))?;
        }
    }

    Ok(updated)
}

/// Invalidate a token by value. Returns whether it was valid until now.
pub async fn invalidate(pool: &DbPool, token: &str, reason: &str) -> Result<bool, AppError> {
    let changed = api_tokens::invalidate_token(pool, token, reason).await?;
    if changed {
        log::info!("[tokens] API token invalidated: {}", reason);
    }
    Ok(changed)
}

/// Resolve a token value to its active owner.
///
/// Returns `None` for malformed, unknown, invalid or expired tokens, and for
/// tokens whose owner is inactive. Values no registered generator recognizes
/// are rejected without a lookup. A successful lookup records `last_used`.
pub async fn authenticate(
    pool: &DbPool,
    registry: &TokenGeneratorRegistry,
    token_value: &str,
) -> Result<Option<(User, WebApiToken)>, AppError> {
    if !registry.recognizes(token_value) {
        log::debug!("[tokens] Rejected malformed API token");
        return Ok(None);
    }

    let Some(mut token) = api_tokens::get_by_value(pool, token_value).await? else {
        return Ok(None);
    };

    let now = db::now();
    if !token.is_usable(now) {
        log::debug!("[tokens] Rejected unusable API token {}", token.id);
        return Ok(None);
    }

    let Some(user) = users::get_user(pool, token.user_id).await? else {
        return Ok(None);
    };
    if !user.is_active {
        return Ok(None);
    }

    api_tokens::touch_last_used(pool, token.id, now).await?;
    token.last_used = Some(now);

    Ok(Some((user, token)))
}
