//! Web API error responses.
//!
//! Every failure renders as
//! `{"stat": "fail", "err": {"code": N, "msg": "..."}, "fields": {...}}`
//! with a numbered error code clients can switch on.

use crate::error::AppError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;

/// A numbered web API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebApiError {
    pub code: u32,
    pub msg: &'static str,
    pub status: StatusCode,
}

pub const SERVICE_NOT_CONFIGURED: WebApiError = WebApiError {
    code: 1,
    msg: "An internal error occurred",
    status: StatusCode::INTERNAL_SERVER_ERROR,
};

pub const DOES_NOT_EXIST: WebApiError = WebApiError {
    code: 100,
    msg: "Object does not exist",
    status: StatusCode::NOT_FOUND,
};

pub const PERMISSION_DENIED: WebApiError = WebApiError {
    code: 101,
    msg: "You don't have permission for this",
    status: StatusCode::FORBIDDEN,
};

pub const NOT_LOGGED_IN: WebApiError = WebApiError {
    code: 103,
    msg: "You are not logged in",
    status: StatusCode::UNAUTHORIZED,
};

pub const INVALID_FORM_DATA: WebApiError = WebApiError {
    code: 105,
    msg: "One or more fields had errors",
    status: StatusCode::BAD_REQUEST,
};

pub const PUBLISH_ERROR: WebApiError = WebApiError {
    code: 225,
    msg: "An error occurred during publishing",
    status: StatusCode::INTERNAL_SERVER_ERROR,
};

pub const TOKEN_GENERATION_FAILED: WebApiError = WebApiError {
    code: 231,
    msg: "There was an error generating the API token",
    status: StatusCode::INTERNAL_SERVER_ERROR,
};

#[derive(Serialize)]
struct ErrBody<'a> {
    code: u32,
    msg: &'a str,
}

#[derive(Serialize)]
struct FailBody<'a> {
    stat: &'static str,
    err: ErrBody<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a BTreeMap<String, String>>,
}

/// Wrapper to make AppError usable as an axum error response.
#[derive(Debug)]
pub struct ApiErr(pub AppError);

impl ApiErr {
    /// The numbered error this maps to.
    pub fn web_api_error(&self) -> WebApiError {
        match &self.0 {
            AppError::NotFound { .. } => DOES_NOT_EXIST,
            AppError::PermissionDenied { .. } => PERMISSION_DENIED,
            AppError::NotLoggedIn => NOT_LOGGED_IN,
            AppError::InvalidInput { .. } => INVALID_FORM_DATA,
            AppError::Publish { .. } => PUBLISH_ERROR,
            AppError::TokenGeneration { .. } => TOKEN_GENERATION_FAILED,
            AppError::Database { .. } | AppError::Internal { .. } => SERVICE_NOT_CONFIGURED,
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let error = self.web_api_error();

        // Internal failures only ever show the generic text.
        let msg = match &self.0 {
            AppError::Publish { message } | AppError::TokenGeneration { message } => {
                message.as_str()
            }
            AppError::InvalidInput { message, fields } if fields.is_empty() => message.as_str(),
            AppError::Database { .. } | AppError::Internal { .. } => {
                log::error!("[webapi] {}", self.0);
                error.msg
            }
            _ => error.msg,
        };

        let body = FailBody {
            stat: "fail",
            err: ErrBody {
                code: error.code,
                msg,
            },
            fields: self.0.field_errors(),
        };

        let mut response = (error.status, Json(body)).into_response();
        if error.status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"Web API\""),
            );
        }
        response
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<sqlx::Error> for ApiErr {
    fn from(err: sqlx::Error) -> Self {
        Self(AppError::from(err))
    }
}

impl From<crate::services::reviews::RevokeShipItError> for ApiErr {
    fn from(err: crate::services::reviews::RevokeShipItError) -> Self {
        Self(AppError::from(err))
    }
}
