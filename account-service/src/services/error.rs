use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::jwt::TokenError;
use super::repository::RepositoryError;
use crate::dtos::ErrorResponse;
use crate::utils::CredentialError;

/// Seconds a client should wait before retrying after a storage timeout.
const TIMEOUT_RETRY_AFTER_SECS: &str = "1";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationFailed(String),

    #[error("Account not found")]
    NotFound,

    #[error("Email already in use")]
    AlreadyExists,

    #[error("Email already in use")]
    DuplicateKey,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Hashing failure: {0}")]
    HashingFailure(String),

    #[error("Signing failure: {0}")]
    SigningFailure(String),

    #[error("Storage operation timed out")]
    Timeout,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No route for {0}")]
    NoRoute(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable kind rendered in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::ValidationFailed(_) => "validation_failed",
            ServiceError::NotFound | ServiceError::NoRoute(_) => "not_found",
            ServiceError::MethodNotAllowed => "method_not_allowed",
            ServiceError::AlreadyExists | ServiceError::DuplicateKey => "already_exists",
            ServiceError::InvalidCredentials => "invalid_credentials",
            ServiceError::InvalidToken => "invalid_token",
            ServiceError::ExpiredToken => "expired_token",
            ServiceError::MalformedToken => "malformed_token",
            ServiceError::HashingFailure(_) => "hashing_failure",
            ServiceError::SigningFailure(_) => "signing_failure",
            ServiceError::Timeout => "timeout",
            ServiceError::Storage(_) | ServiceError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::NotFound | ServiceError::NoRoute(_) => StatusCode::NOT_FOUND,
            ServiceError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServiceError::AlreadyExists | ServiceError::DuplicateKey => StatusCode::CONFLICT,
            ServiceError::InvalidCredentials
            | ServiceError::InvalidToken
            | ServiceError::ExpiredToken
            | ServiceError::MalformedToken => StatusCode::UNAUTHORIZED,
            ServiceError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::HashingFailure(_)
            | ServiceError::SigningFailure(_)
            | ServiceError::Storage(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal faults render a fixed message; their details go to the log.
    fn public_message(&self) -> String {
        match self {
            ServiceError::HashingFailure(_)
            | ServiceError::SigningFailure(_)
            | ServiceError::Storage(_)
            | ServiceError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ServiceError::NotFound,
            RepositoryError::DuplicateKey => ServiceError::DuplicateKey,
            RepositoryError::Timeout => ServiceError::Timeout,
            RepositoryError::Backend(e) => ServiceError::Storage(e),
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => ServiceError::InvalidToken,
            TokenError::Expired => ServiceError::ExpiredToken,
            TokenError::Malformed => ServiceError::MalformedToken,
            TokenError::Signing(e) => ServiceError::SigningFailure(e),
        }
    }
}

impl From<CredentialError> for ServiceError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Hashing(e) => ServiceError::HashingFailure(e),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationFailed(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        }

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message: self.public_message(),
        });

        let mut response = (status, body).into_response();
        if matches!(self, ServiceError::Timeout) {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(TIMEOUT_RETRY_AFTER_SECS),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: ServiceError) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, retry_after, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn uniqueness_kinds_render_identically() {
        let (s1, _, b1) = render(ServiceError::AlreadyExists).await;
        let (s2, _, b2) = render(ServiceError::DuplicateKey).await;

        assert_eq!(s1, StatusCode::CONFLICT);
        assert_eq!(s1, s2);
        assert_eq!(b1, b2);
        assert_eq!(b1["error"], "already_exists");
    }

    #[tokio::test]
    async fn storage_details_are_not_rendered() {
        let (status, _, body) =
            render(ServiceError::Storage("connection reset by 10.0.0.7".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal");
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn timeout_carries_retry_after() {
        let (status, retry_after, body) = render(ServiceError::Timeout).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(retry_after.as_deref(), Some("1"));
        assert_eq!(body["error"], "timeout");
    }

    #[tokio::test]
    async fn routing_failures_are_structured() {
        let (status, _, body) = render(ServiceError::NoRoute("/nope".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _, body) = render(ServiceError::MethodNotAllowed).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "method_not_allowed");

        let (status, _, body) = render(ServiceError::Internal("boom".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[test]
    fn token_errors_keep_their_kind() {
        assert_eq!(ServiceError::from(TokenError::Invalid).code(), "invalid_token");
        assert_eq!(ServiceError::from(TokenError::Expired).code(), "expired_token");
        assert_eq!(ServiceError::from(TokenError::Malformed).code(), "malformed_token");
        assert_eq!(
            ServiceError::from(TokenError::Signing("x".into())).code(),
            "signing_failure"
        );
    }

    #[test]
    fn repository_errors_map_into_taxonomy() {
        assert!(matches!(
            ServiceError::from(RepositoryError::NotFound),
            ServiceError::NotFound
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::DuplicateKey),
            ServiceError::DuplicateKey
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::Timeout),
            ServiceError::Timeout
        ));
    }
}
