use crate::domains::auth::JwtService;
use crate::server::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Authenticated user information from JWT
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

/// Query parameters that may carry the token
#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// JWT authentication middleware
///
/// Extracts JWT token from the Authorization header (or the `token` query
/// param, since EventSource can't send headers), verifies it, and adds
/// AuthUser to request extensions.
/// If no token or invalid token, request continues without AuthUser (public access).
pub async fn jwt_auth_middleware(
    jwt_service: Arc<JwtService>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let auth_user = extract_auth_user(&request, &jwt_service);

    if let Some(user) = auth_user {
        debug!(user_id = %user.user_id, "Authenticated user");
        request.extensions_mut().insert(user);
    } else {
        debug!("No valid authentication token");
    }

    next.run(request).await
}

/// Extract and verify JWT token from request
fn extract_auth_user(
    request: &axum::http::Request<axum::body::Body>,
    jwt_service: &JwtService,
) -> Option<AuthUser> {
    let token = match header_token(request) {
        Some(token) => token.to_string(),
        None => query_token(request)?,
    };

    let claims = jwt_service.verify_token(&token).ok()?;

    Some(AuthUser {
        user_id: claims.sub,
    })
}

fn header_token(request: &axum::http::Request<axum::body::Body>) -> Option<&str> {
    let auth_str = request.headers().get("authorization")?.to_str().ok()?;

    // Handle both "Bearer <token>" and raw token
    Some(auth_str.strip_prefix("Bearer ").unwrap_or(auth_str))
}

fn query_token(request: &axum::http::Request<axum::body::Body>) -> Option<String> {
    let Query(query) = Query::<TokenQuery>::try_from_uri(request.uri()).ok()?;
    query.token.filter(|token| !token.is_empty())
}

/// Handlers that take an `AuthUser` reject anonymous requests.
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}
