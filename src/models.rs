//! Wire and storage types for users, menu, franchises and orders.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Diner,
    Franchisee,
    Admin,
}

/// A role grant; franchisee grants point at the franchise they administer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<u64>,
}

impl UserRole {
    pub fn new(role: Role) -> Self {
        Self { role, object_id: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub roles: Vec<UserRole>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub image: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMenuItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FranchiseAdmin {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: u64,
    pub name: String,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Franchise {
    pub id: u64,
    pub name: String,
    pub admins: Vec<FranchiseAdmin>,
    pub stores: Vec<Store>,
}

impl Franchise {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admins.iter().any(|admin| admin.id == user_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminRef {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFranchise {
    pub name: String,
    #[serde(default)]
    pub admins: Vec<AdminRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStore {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_id: u64,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub franchise_id: u64,
    pub store_id: u64,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    pub franchise_id: u64,
    pub store_id: u64,
    pub date: chrono::DateTime<chrono::Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn total_price(&self) -> f64 {
        self.items.iter().map(|item| item.price).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub diner_id: u64,
    pub orders: Vec<Order>,
    pub page: u32,
}
