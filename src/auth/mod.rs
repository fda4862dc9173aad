pub mod manager;
pub mod session_store;
pub mod token;

pub use manager::{AuthError, AuthSessionManager, InvalidReason, Verification};
pub use session_store::{MemorySessionStore, SessionStore, SqliteSessionStore};

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{Role, UserRole};
use token::Claims;

/// Identity resolved from a live session token, attached to the request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub roles: Vec<UserRole>,
}

impl AuthUser {
    pub fn is_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r.role == role)
    }

    pub fn is_admin(&self) -> bool {
        self.is_role(Role::Admin)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            name: claims.name,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

/// Protected-route gate.
///
/// Only reads the identity `resolve_identity` already attached; it never
/// re-verifies the token.
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Identity middleware
/// Resolves the Bearer token (if any) and attaches the user on success.
/// Never rejects: unauthenticated requests continue without a user.
pub async fn resolve_identity(
    State(auth): State<Arc<AuthSessionManager>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = bearer_token(req.headers()).map(str::to_owned);

    if let Some(user) = auth.authenticate(token.as_deref()).await {
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}

/// Extract Bearer token from the Authorization header; the scheme is case-insensitive
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth_header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = auth_header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();

    if token.is_empty() {
        return None;
    }

    Some(token)
}
