/**
 * Authentication Middleware
 *
 * Protects the API routes. It extracts and verifies the bearer JWT from the
 * Authorization header and attaches the caller to the request extensions,
 * where handlers pick it up through the `AuthUser` extractor.
 */

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;
use uuid::Uuid;

/// Authenticated user data extracted from JWT token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: Option<String>,
}

fn bearer_token(request: &Request) -> Result<&str, BackendError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing Authorization header");
            BackendError::Unauthorized
        })?;
    header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!("Invalid Authorization header format");
        BackendError::Unauthorized
    })
}

/// Authentication middleware
///
/// Returns 401 with the standard error envelope if the token is missing,
/// malformed, expired or signed with another secret.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    let token = bearer_token(&request)?;
    let claims = app_state.jwt.verify(token).map_err(|e| {
        tracing::warn!("Invalid token: {:?}", e);
        BackendError::Unauthorized
    })?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|e| {
        tracing::warn!("Invalid user ID in token: {:?}", e);
        BackendError::Unauthorized
    })?;

    request.extensions_mut().insert(AuthenticatedUser {
        user_id,
        username: claims.username,
    });

    Ok(next.run(request).await)
}

/// Axum extractor for the authenticated user set by [`auth_middleware`]
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = BackendError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("AuthenticatedUser not found in request extensions");
                BackendError::Unauthorized
            })?;
        Ok(AuthUser(user))
    }
}
