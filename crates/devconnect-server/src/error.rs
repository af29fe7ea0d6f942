use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use devconnect_shared::error::{CredentialError, IdParseError};
use devconnect_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Cannot send connection request to yourself")]
    InvalidTarget,

    #[error("Already connected with this user")]
    AlreadyConnected,

    #[error("{0}")]
    DuplicateRequest(String),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServerError {
    /// Stable machine-checkable error category.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Validation(_) => "validation_error",
            ServerError::NotFound(_) => "not_found",
            ServerError::Forbidden(_) | ServerError::Unauthenticated => "forbidden",
            ServerError::InvalidTarget
            | ServerError::AlreadyConnected
            | ServerError::DuplicateRequest(_)
            | ServerError::DuplicateEmail => "conflict",
            ServerError::Unavailable(_) => "unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServerError::InvalidTarget
            | ServerError::AlreadyConnected
            | ServerError::DuplicateRequest(_)
            | ServerError::DuplicateEmail => StatusCode::CONFLICT,
            ServerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = match &self {
            ServerError::Unavailable(detail) => {
                tracing::error!(error = %detail, "Request failed on an unavailable dependency");
                "Service temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "kind": self.kind(),
        });

        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("Record not found".into()),
            StoreError::DuplicateEmail(_) => ServerError::DuplicateEmail,
            other => ServerError::Unavailable(other.to_string()),
        }
    }
}

impl From<IdParseError> for ServerError {
    fn from(e: IdParseError) -> Self {
        ServerError::Validation(e.to_string())
    }
}

impl From<CredentialError> for ServerError {
    fn from(e: CredentialError) -> Self {
        ServerError::Unavailable(e.to_string())
    }
}
