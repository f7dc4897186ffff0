//! # HTTP error mapping
//!
//! `AppError` lives in fl-core and knows nothing about HTTP; this wrapper gives
//! every kind its status code and a small JSON body.

use std::fmt;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use fl_core::AppError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    fn code(&self) -> &'static str {
        match &self.0 {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(..) => "NOT_FOUND",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Locked(_) => "LOCKED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Locked(_) => StatusCode::LOCKED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal details go to the log, never to the client.
        let message = match &self.0 {
            AppError::Internal(detail) => {
                error!(%detail, "request failed");
                "internal error".to_string()
            }
            AppError::Forbidden(msg) => msg.clone(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Unauthorized("x".into()), 401),
            (AppError::forbidden("x"), 403),
            (AppError::not_found("comment", "1"), 404),
            (AppError::invalid("x"), 400),
            (AppError::Locked("x".into()), 423),
            (AppError::Conflict("x".into()), 409),
            (AppError::Internal("db down".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status_code().as_u16(), status);
        }
    }
}
