//! Unified application error model and mapping helpers.
//! Handlers return `AppResult<T>`; every variant carries a stable machine code and a
//! localized message that is safe to show to the visitor. Internal details are logged
//! where the error is converted, never serialized.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::identity::{AuthFailure, IdentityError};
use crate::store::StoreError;

pub const MSG_UNAVAILABLE: &str = "Paslauga laikinai nepasiekiama. Bandykite vėliau.";
pub const MSG_INTERNAL: &str = "Įvyko netikėta klaida. Bandykite dar kartą.";
pub const MSG_UNAUTHORIZED: &str = "Prisijunkite, kad galėtumėte tęsti.";
pub const MSG_FORBIDDEN: &str = "Neturite teisės atlikti šio veiksmo.";
pub const MSG_VALIDATION: &str = "Patikrinkite pažymėtus formos laukus.";

/// One violated field of a submitted form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    /// Wire name of the field, dotted for nested objects (`contactInfo.email`).
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self { field: field.into(), code: code.to_string(), message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Validation { errors: Vec<FieldError> },
    NotFound { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    RateLimited { code: String, message: String },
    Unavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { .. } => "validation_failed",
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::RateLimited { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { .. } => MSG_VALIDATION,
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::RateLimited { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn rate_limited<S: Into<String>>(code: S, msg: S) -> Self { AppError::RateLimited { code: code.into(), message: msg.into() } }
    pub fn unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }
    pub fn validation(errors: Vec<FieldError>) -> Self { AppError::Validation { errors } }

    pub fn unauthorized() -> Self { Self::auth("unauthorized", MSG_UNAUTHORIZED) }

    pub fn backend_unavailable() -> Self { Self::unavailable("backend_unavailable", MSG_UNAVAILABLE) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Validation { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::RateLimited { .. } => 429,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }

    /// JSON body sent to the browser.
    pub fn body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "success": false,
            "error": self.code_str(),
            "message": self.message(),
        });
        if let AppError::Validation { errors } = self {
            body["errors"] = serde_json::to_value(errors).unwrap_or_default();
        }
        body
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation { errors } => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                write!(f, "validation_failed: {}", fields.join(", "))
            }
            _ => write!(f, "{}: {}", self.code_str(), self.message()),
        }
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}

impl From<AuthFailure> for AppError {
    fn from(f: AuthFailure) -> Self {
        match f {
            AuthFailure::RateLimited => AppError::rate_limited(f.code(), f.user_message()),
            _ => AppError::auth(f.code(), f.user_message()),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Auth(f) => f.into(),
            IdentityError::Unavailable(detail) => {
                tracing::warn!(target: "picnic::auth", "identity provider unavailable: {}", detail);
                AppError::backend_unavailable()
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(detail) => {
                tracing::warn!(target: "picnic::store", "document store unavailable: {}", detail);
                AppError::backend_unavailable()
            }
            other => {
                tracing::error!(target: "picnic::store", "document store error: {}", other);
                AppError::internal("store_error", MSG_INTERNAL)
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("internal error: {:#}", err);
        AppError::internal("internal", MSG_INTERNAL)
    }
}
