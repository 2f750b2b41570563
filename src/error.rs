//! Application error types.
//!
//! `AppError` is what services and handlers return. It serializes to a
//! tagged JSON object and maps onto the web API's numbered error codes in
//! `webapi::errors`.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Application-level errors.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// One or more request fields were missing or malformed.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        /// Field name → human-readable problem.
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        fields: BTreeMap<String, String>,
    },

    /// The caller is authenticated but not allowed to do this.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// The caller is not authenticated.
    #[error("Not logged in")]
    NotLoggedIn,

    /// A unique token value could not be generated.
    #[error("Token generation failed: {message}")]
    TokenGeneration { message: String },

    /// A review could not be published.
    #[error("Publish error: {message}")]
    Publish { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: None,
        }
    }

    /// Create a database error with operation context.
    pub fn database_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.to_string()),
        }
    }

    /// Create an invalid input error without field details.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Create an invalid input error for a single field.
    pub fn invalid_field(field: impl Into<String>, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), problem.clone());
        Self::InvalidInput {
            message: problem,
            fields,
        }
    }

    /// Create an invalid input error for several fields at once.
    pub fn invalid_fields(fields: BTreeMap<String, String>) -> Self {
        Self::InvalidInput {
            message: "One or more fields had errors".to_string(),
            fields,
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a token generation error.
    pub fn token_generation(message: impl Into<String>) -> Self {
        Self::TokenGeneration {
            message: message.into(),
        }
    }

    /// Create a publish error.
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Field-level problems, if this is an invalid input error.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::InvalidInput { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("Object"),
            other => Self::database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}

impl From<crate::services::token_generator::TokenGenerationError> for AppError {
    fn from(err: crate::services::token_generator::TokenGenerationError) -> Self {
        Self::token_generation(err.to_string())
    }
}
