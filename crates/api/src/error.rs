use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::booking::ErrorKind;

/// Errors raised outside GraphQL execution: transport, auth and health.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("database unavailable")]
    Db(#[from] sqlx::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, ErrorKind) {
        match self {
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, ErrorKind::Forbidden),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::InvalidInput),
            AppError::Db(_) => (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::Internal),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Db(e) = &self {
            tracing::error!("Database error: {}", e);
        }

        let (status, kind) = self.status_and_kind();
        let body = ErrorBody {
            error: self.to_string(),
            code: kind.code(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_status_and_code() {
        let (status, kind) = AppError::Unauthorized("nope".into()).status_and_kind();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(kind.code(), "FORBIDDEN");

        let (status, kind) = AppError::Db(sqlx::Error::PoolTimedOut).status_and_kind();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(kind, ErrorKind::Internal);
        assert_eq!(AppError::Db(sqlx::Error::PoolTimedOut).to_string(), "database unavailable");
    }
}
