//! Application error types.
//!
//! Every fallible operation in the crate returns [`AppError`]. With the `web`
//! feature the error also renders itself as a JSON response so handlers can
//! simply use `?`.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name to message map produced by form validation.
pub type FieldErrors = BTreeMap<String, String>;

/// Application-level errors.
///
/// All variants serialize to a structured JSON object for API consumers.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// The data store rejected or failed a request.
    #[error("Backend error: {message}")]
    Backend {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        table: Option<String>,
    },

    /// Local file storage failed.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Network request failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// An email could not be built or delivered.
    #[error("Mail error: {message}")]
    Mail { message: String },

    /// Authentication failed or the session is missing/expired.
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// A submitted form failed field-level validation.
    #[error("Validation failed for {} field(s)", .errors.len())]
    Validation { errors: FieldErrors },

    /// An uploaded file could not be imported.
    #[error("{message}")]
    Import { message: String },

    /// Export generation failed.
    #[error("Export error: {message}")]
    Export { message: String },

    /// Configuration is missing or malformed.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            status_code: None,
            table: None,
        }
    }

    /// Create a backend error with status code and table.
    pub fn backend_full(message: impl Into<String>, status_code: u16, table: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            status_code: Some(status_code),
            table: Some(table.into()),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a mail error.
    pub fn mail(message: impl Into<String>) -> Self {
        Self::Mail {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
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

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn validation(errors: FieldErrors) -> Self {
        Self::Validation { errors }
    }

    pub fn import(message: impl Into<String>) -> Self {
        Self::Import {
            message: message.into(),
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Message suitable for a user-facing banner.
    ///
    /// Unlike `Display`, this omits the variant prefix for errors whose
    /// message is already written for end users.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput { message, .. }
            | Self::Import { message }
            | Self::Mail { message }
            | Self::Authentication { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

// Conversions from common error types

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<handlebars::RenderError> for AppError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::mail(format!("Failed to render email: {}", err))
    }
}

impl From<handlebars::TemplateError> for AppError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::internal(format!("Invalid email template: {}", err))
    }
}

#[cfg(feature = "web")]
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network("Failed to connect to server")
        } else if err.is_status() {
            Self::backend(format!("HTTP error: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

#[cfg(feature = "web")]
impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        Self::mail(format!("Failed to build email: {}", err))
    }
}

#[cfg(feature = "web")]
impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::mail(format!("Invalid email address: {}", err))
    }
}

#[cfg(feature = "web")]
impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::mail(err.to_string())
    }
}

#[cfg(feature = "web")]
impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::export(err.to_string())
    }
}

#[cfg(feature = "web")]
mod response {
    use super::{AppError, FieldErrors};
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use serde::Serialize;

    /// JSON body sent for every failed API request.
    #[derive(Serialize)]
    struct ApiError {
        code: &'static str,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        errors: Option<FieldErrors>,
    }

    impl AppError {
        /// HTTP status and machine-readable code for this error.
        pub fn status(&self) -> (StatusCode, &'static str) {
            match self {
                AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                AppError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                AppError::Import { .. } => (StatusCode::BAD_REQUEST, "IMPORT_FAILED"),
                AppError::Validation { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED")
                }
                AppError::Authentication { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                AppError::Backend { .. } | AppError::Network { .. } => {
                    (StatusCode::BAD_GATEWAY, "BACKEND_ERROR")
                }
                AppError::Mail { .. } => (StatusCode::BAD_GATEWAY, "MAIL_ERROR"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            }
        }
    }

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let (status, code) = self.status();
            if status.is_server_error() {
                log::error!("{}", self);
            }
            let message = self.user_message();
            let errors = match self {
                AppError::Validation { errors } => Some(errors),
                _ => None,
            };
            (
                status,
                Json(ApiError {
                    code,
                    message,
                    errors,
                }),
            )
                .into_response()
        }
    }
}
