use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{Franchise, NewFranchise, NewStore, Store};

/// `GET /api/franchise`
pub async fn list_franchises(
    State(state): State<AppState>,
) -> Result<Json<Vec<Franchise>>, AppError> {
    Ok(Json(state.store.get_franchises().await?))
}

/// `GET /api/franchise/:userId`. Other users' franchises read as empty.
pub async fn user_franchises(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<u64>,
) -> Result<Json<Vec<Franchise>>, AppError> {
    if user.id != user_id && !user.is_admin() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(state.store.get_user_franchises(user_id).await?))
}

/// `POST /api/franchise`
pub async fn create_franchise(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<NewFranchise>,
) -> Result<Json<Franchise>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("unauthorized".to_string()));
    }
    Ok(Json(state.store.create_franchise(req).await?))
}

/// `DELETE /api/franchise/:franchiseId`
pub async fn delete_franchise(
    State(state): State<AppState>,
    user: AuthUser,
    Path(franchise_id): Path<u64>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("unable to delete a franchise".to_string()));
    }
    state.store.delete_franchise(franchise_id).await?;
    Ok(Json(json!({ "message": "franchise deleted" })))
}

/// Admins may manage any franchise, franchisees only their own
async fn can_manage(state: &AppState, user: &AuthUser, franchise_id: u64) -> Result<bool, AppError> {
    let franchise = state.store.get_franchise(franchise_id).await?;
    Ok(franchise.is_some_and(|f| user.is_admin() || f.is_admin(user.id)))
}

/// `POST /api/franchise/:franchiseId/store`
pub async fn create_store(
    State(state): State<AppState>,
    user: AuthUser,
    Path(franchise_id): Path<u64>,
    Json(req): Json<NewStore>,
) -> Result<Json<Store>, AppError> {
    if !can_manage(&state, &user, franchise_id).await? {
        return Err(AppError::Forbidden("unauthorized".to_string()));
    }
    Ok(Json(state.store.create_store(franchise_id, req).await?))
}

/// `DELETE /api/franchise/:franchiseId/store/:storeId`
pub async fn delete_store(
    State(state): State<AppState>,
    user: AuthUser,
    Path((franchise_id, store_id)): Path<(u64, u64)>,
) -> Result<Json<Value>, AppError> {
    if !can_manage(&state, &user, franchise_id).await? {
        return Err(AppError::Forbidden("unable to delete a store".to_string()));
    }
    state.store.delete_store(franchise_id, store_id).await?;
    Ok(Json(json!({ "message": "store deleted" })))
}
