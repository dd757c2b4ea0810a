//! Bearer token check for the `/api/v1` routes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::service::ServiceError;
use crate::AppState;

/// Validate the authorization header against the configured token.
pub fn validate_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), ServiceError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(value) if value.starts_with("Bearer ") => {
            let provided_token = &value[7..];
            if provided_token == expected_token {
                Ok(())
            } else {
                Err(ServiceError::Unauthorized("invalid token".to_string()))
            }
        }
        Some(_) => Err(ServiceError::Unauthorized(
            "invalid Authorization header format, expected: Bearer <token>".to_string(),
        )),
        None => Err(ServiceError::Unauthorized(
            "missing Authorization header, expected: Bearer <token>".to_string(),
        )),
    }
}

/// Middleware: reject API requests without the configured bearer token.
///
/// Without a configured token the API is open.
pub async fn require_api_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.api_auth_token {
        if let Err(e) = validate_auth(request.headers(), expected) {
            tracing::warn!("Rejected API request to {}: {}", request.uri().path(), e);
            return e.into_response();
        }
    }
    next.run(request).await
}
