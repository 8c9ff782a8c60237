use std::any::Any;

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::services::ServiceError;

/// Catch-all for paths no route matches.
pub async fn not_found(req: Request) -> ServiceError {
    tracing::debug!(method = %req.method(), path = %req.uri().path(), "No route matched");
    ServiceError::NoRoute(req.uri().path().to_string())
}

/// Replaces the router's bodiless 405 with the JSON error shape, keeping `Allow`.
pub async fn json_method_not_allowed(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED
        || response.headers().contains_key(header::CONTENT_TYPE)
    {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut rendered = ServiceError::MethodNotAllowed.into_response();
    if let Some(allow) = allow {
        rendered.headers_mut().insert(header::ALLOW, allow);
    }
    rendered
}

/// Renders a handler panic as an opaque 500.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Request handler panicked");
    ServiceError::Internal(detail.to_string()).into_response()
}
