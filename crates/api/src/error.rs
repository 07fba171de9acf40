//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{AccountError, AuthError, ErrorKind, OrderError};

/// API-level error: a domain error kind plus the message shown to the client.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Bad request from the client.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn forbidden() -> Self {
        Self::from(AuthError::Forbidden)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.kind)
    }
}

/// Maps a domain error kind to its HTTP status code.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::InsufficientStock
        | ErrorKind::DuplicateEmail
        | ErrorKind::DuplicateName
        | ErrorKind::HasOrders => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InternalConsistency | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("api_errors_total", "kind" => self.kind.as_str()).increment(1);

        let message = if status.is_server_error() {
            tracing::error!(kind = %self.kind, error = %self.message, "internal server error");
            "Internal server error".to_string()
        } else {
            self.message
        };

        let body = serde_json::json!({ "error": message, "kind": self.kind });
        (status, axum::Json(body)).into_response()
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_409() {
        for kind in [
            ErrorKind::InsufficientStock,
            ErrorKind::DuplicateEmail,
            ErrorKind::DuplicateName,
            ErrorKind::HasOrders,
        ] {
            assert_eq!(status_for(kind), StatusCode::CONFLICT, "{kind}");
        }
    }

    #[test]
    fn auth_errors_keep_their_kind() {
        assert_eq!(
            ApiError::from(AuthError::MissingToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::forbidden().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(AccountError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn empty_order_is_bad_request() {
        assert_eq!(
            ApiError::from(OrderError::EmptyOrder).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn consistency_failures_hide_their_message() {
        let response =
            ApiError::from(AccountError::InternalConsistency("no cart".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
