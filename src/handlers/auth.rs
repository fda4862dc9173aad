use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use super::AppState;
use crate::auth::{bearer_token, AuthUser};
use crate::database::DataError;
use crate::error::AppError;
use crate::models::{Credentials, RegisterRequest, Role, UpdateUserRequest, User, UserRole};
use crate::observability::Counter;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// `POST /api/auth`
///
/// A body that is not a JSON object is treated as one with every field missing.
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable registration body");
            RegisterRequest::default()
        }
    };

    let (Some(name), Some(email), Some(password)) = (
        req.name.filter(|s| !s.is_empty()),
        req.email.filter(|s| !s.is_empty()),
        req.password.filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "name, email, and password are required".to_string(),
        ));
    };

    let user = state
        .store
        .add_user(&name, &email, &password, vec![UserRole::new(Role::Diner)])
        .await?;
    let token = state.auth.issue(&user).await?;

    state.metrics.user_logged_in();
    state.metrics.increment(Counter::AuthSuccess);
    tracing::info!(user_id = user.id, "User registered");

    Ok(Json(AuthResponse { user, token }))
}

/// `PUT /api/auth`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let creds = match body {
        Ok(Json(creds)) => creds,
        Err(rejection) => {
            state.metrics.increment(Counter::AuthFailure);
            tracing::debug!(error = %rejection, "Unreadable login body");
            return Err(AppError::NotFound("unknown user".to_string()));
        }
    };

    let user = match state.store.get_user(&creds.email, &creds.password).await {
        Ok(user) => user,
        Err(e) => {
            state.metrics.increment(Counter::AuthFailure);
            if let DataError::Internal(ref msg) = e {
                tracing::error!(error = %msg, "User lookup failed");
            }
            return Err(e.into());
        }
    };

    let token = state.auth.issue(&user).await?;

    state.metrics.user_logged_in();
    state.metrics.increment(Counter::AuthSuccess);
    tracing::debug!(user_id = user.id, "User logged in");

    Ok(Json(AuthResponse { user, token }))
}

/// `DELETE /api/auth`
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    if let Some(token) = bearer_token(&headers) {
        state.auth.revoke(token).await?;
    }
    state.metrics.user_logged_out();
    tracing::debug!(user_id = user.id, "User logged out");

    Ok(Json(json!({ "message": "logout successful" })))
}

/// `PUT /api/auth/:userId`, allowed for the user themself or an admin
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<u64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    if user.id != user_id && !user.is_admin() {
        return Err(AppError::Forbidden("unauthorized".to_string()));
    }

    let updated = state
        .store
        .update_user(user_id, req.email.as_deref(), req.password.as_deref())
        .await?;

    Ok(Json(updated))
}
