use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use platform_authn::AuthError;
use platform_db::DbError;
use platform_mail::MailError;
use serde_json::json;
use thiserror::Error;

/// Shared handler result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Every variant renders as `{"error": <message>}` with its status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Log a failed outbound call under `site` and turn it into a 500 that
    /// forwards the upstream message.
    pub fn upstream(site: &'static str, err: impl Into<ApiError>) -> Self {
        let err = err.into();
        tracing::error!(site, error = %err, "upstream call failed");
        match err {
            ApiError::Upstream(message) => ApiError::Upstream(message),
            other => ApiError::Upstream(other.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::NotFound => ApiError::NotFound,
            DbError::Upstream { message, .. } => ApiError::Upstream(message),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Unauthorized => ApiError::Unauthorized,
            AuthError::Upstream { message, .. } => ApiError::Upstream(message),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(value: MailError) -> Self {
        match value {
            MailError::Rejected { body, .. } => ApiError::Upstream(body),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::InvalidInput(value.body_text())
    }
}
