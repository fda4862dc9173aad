use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{MenuItem, NewMenuItem, NewOrder, Order, OrderPage};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order: Order,
    pub report_slow_pizza_to_factory_url: Option<String>,
    pub jwt: Option<String>,
}

/// `GET /api/order/menu`
pub async fn get_menu(State(state): State<AppState>) -> Result<Json<Vec<MenuItem>>, AppError> {
    Ok(Json(state.store.get_menu().await?))
}

/// `PUT /api/order/menu`, admin only; returns the updated menu
pub async fn add_menu_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(item): Json<NewMenuItem>,
) -> Result<Json<Vec<MenuItem>>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("unable to add menu item".to_string()));
    }

    state.store.add_menu_item(item).await?;
    Ok(Json(state.store.get_menu().await?))
}

/// `GET /api/order`
pub async fn get_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<OrderPage>, AppError> {
    let page = query.page.unwrap_or(1);
    Ok(Json(state.store.get_orders(user.id, page).await?))
}

/// `POST /api/order`: record the order, then have the factory bake it
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<NewOrder>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.store.add_diner_order(user.id, req).await?;
    let fulfillment = state.factory.create_order(&user, &order).await?;

    Ok(Json(OrderResponse {
        order,
        report_slow_pizza_to_factory_url: fulfillment.report_url,
        jwt: fulfillment.jwt,
    }))
}
