use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::Error;

/// Wire form of every failed RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub foreign_key: bool,
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub foreign_key: bool,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            foreign_key: false,
        }
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_argument", message)
    }

    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }

    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "permission_denied", message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument(_)
            | Error::NotDelta(_)
            | Error::Constraint(_)
            | Error::InvalidTokenFormat => Self::invalid_argument(err.to_string()),
            Error::ForeignKey => Self {
                foreign_key: true,
                ..Self::invalid_argument(err.to_string())
            },
            Error::NotFound(_) => Self::not_found(err.to_string()),
            Error::Unauthenticated | Error::TokenExpired => Self::unauthenticated(err.to_string()),
            Error::PermissionDenied => Self::permission_denied(err.to_string()),
            Error::Executor { kind, .. } => {
                error!(kind = kind.as_str(), error = %err, "executor failed");
                Self::internal(err.to_string())
            }
            Error::Database(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::StreamClosed => {
                error!(error = %err, "internal error");
                Self::internal("internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
            foreign_key: self.foreign_key,
        };
        let mut response = (self.status, Json(body)).into_response();

        if self.status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"httpdelta\""),
            );
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorErrorKind;

    #[test]
    fn test_error_codes() {
        let cases = [
            (Error::invalid("empty"), StatusCode::BAD_REQUEST, "invalid_argument"),
            (Error::NotDelta("http".into()), StatusCode::BAD_REQUEST, "invalid_argument"),
            (Error::not_found("http"), StatusCode::NOT_FOUND, "not_found"),
            (Error::Unauthenticated, StatusCode::UNAUTHORIZED, "unauthenticated"),
            (Error::PermissionDenied, StatusCode::FORBIDDEN, "permission_denied"),
            (
                Error::Executor {
                    kind: ExecutorErrorKind::Timeout,
                    message: "deadline".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
            assert!(!api.foreign_key);
        }
    }

    #[test]
    fn test_foreign_key_flag() {
        let api = ApiError::from(Error::ForeignKey);
        assert_eq!(api.code, "invalid_argument");
        assert!(api.foreign_key);
    }

    #[test]
    fn test_executor_kind_in_message() {
        let api = ApiError::from(Error::Executor {
            kind: ExecutorErrorKind::Dns,
            message: "no such host".into(),
        });
        assert!(api.message.contains("dns"));
    }

    #[test]
    fn test_unauthenticated_sets_challenge() {
        let response = ApiError::unauthenticated("missing token").into_response();
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            "Bearer realm=\"httpdelta\""
        );
    }
}
