use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::auth::{session_store::StoreError, token::TokenError, AuthError};
use crate::database::DataError;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Missing, invalid or revoked session token
    Unauthorized,
    /// Authenticated but not allowed
    Forbidden(String),
    /// Malformed or incomplete request
    BadRequest(String),
    /// Unknown entity
    NotFound(String),
    /// The fulfillment factory rejected or failed the order
    FactoryError { report_url: Option<String> },
    /// Configuration error
    ConfigError(String),
    /// Internal server error
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden(msg) => write!(f, "{}", msg),
            Self::BadRequest(msg) => write!(f, "{}", msg),
            Self::NotFound(msg) => write!(f, "{}", msg),
            Self::FactoryError { .. } => write!(f, "Failed to fulfill order at factory"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::FactoryError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            Self::FactoryError { report_url } => json!({
                "message": self.to_string(),
                "reportPizzaCreationErrorToPizzaFactoryUrl": report_url,
            }),
            Self::ConfigError(_) | Self::InternalError(_) => {
                tracing::error!(error = %self, "Request failed");
                json!({ "message": "internal server error" })
            }
            _ => json!({ "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Token(TokenError::Signing(e)) => {
                Self::ConfigError(format!("token signing failed: {}", e))
            }
            other => Self::InternalError(other.to_string()),
        }
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => Self::NotFound(msg),
            DataError::Invalid(msg) => Self::BadRequest(msg),
            DataError::Internal(msg) => Self::InternalError(msg),
        }
    }
}
