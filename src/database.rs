//! Data access for users, menu, franchises, stores and orders.
//!
//! Handlers only see the [`PizzaStore`] trait. [`MemoryPizzaStore`] keeps
//! every table in process memory behind one async lock.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::models::{
    Franchise, FranchiseAdmin, MenuItem, NewFranchise, NewMenuItem, NewOrder, NewStore, Order,
    OrderPage, Role, Store, User, UserRole,
};

/// Orders returned per page by [`PizzaStore::get_orders`]
pub const ORDERS_PER_PAGE: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Internal(String),
}

#[async_trait]
pub trait PizzaStore: Send + Sync {
    async fn add_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        roles: Vec<UserRole>,
    ) -> Result<User, DataError>;

    /// Look a user up by credentials; a wrong password reads as an unknown user
    async fn get_user(&self, email: &str, password: &str) -> Result<User, DataError>;

    async fn update_user(
        &self,
        user_id: u64,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, DataError>;

    async fn get_menu(&self) -> Result<Vec<MenuItem>, DataError>;

    async fn add_menu_item(&self, item: NewMenuItem) -> Result<MenuItem, DataError>;

    /// One page (1-based) of a diner's orders, oldest first
    async fn get_orders(&self, diner_id: u64, page: u32) -> Result<OrderPage, DataError>;

    async fn add_diner_order(&self, diner_id: u64, order: NewOrder) -> Result<Order, DataError>;

    async fn get_franchises(&self) -> Result<Vec<Franchise>, DataError>;

    async fn get_user_franchises(&self, user_id: u64) -> Result<Vec<Franchise>, DataError>;

    async fn get_franchise(&self, franchise_id: u64) -> Result<Option<Franchise>, DataError>;

    /// Admins are named by email and gain the franchisee role for the new franchise
    async fn create_franchise(&self, franchise: NewFranchise) -> Result<Franchise, DataError>;

    async fn delete_franchise(&self, franchise_id: u64) -> Result<(), DataError>;

    async fn create_store(&self, franchise_id: u64, store: NewStore) -> Result<Store, DataError>;

    async fn delete_store(&self, franchise_id: u64, store_id: u64) -> Result<(), DataError>;
}

struct UserRow {
    user: User,
    password_hash: String,
}

struct FranchiseRow {
    id: u64,
    name: String,
    admin_ids: Vec<u64>,
    stores: BTreeMap<u64, String>,
}

struct OrderRow {
    diner_id: u64,
    order: Order,
}

#[derive(Default)]
struct Tables {
    next_id: u64,
    users: BTreeMap<u64, UserRow>,
    menu: BTreeMap<u64, MenuItem>,
    franchises: BTreeMap<u64, FranchiseRow>,
    orders: Vec<OrderRow>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_by_email(&self, email: &str) -> Option<&UserRow> {
        self.users.values().find(|row| row.user.email == email)
    }

    fn store_revenue(&self, store_id: u64) -> f64 {
        self.orders
            .iter()
            .filter(|row| row.order.store_id == store_id)
            .map(|row| row.order.total_price())
            .sum()
    }

    fn franchise(&self, row: &FranchiseRow) -> Franchise {
        let admins = row
            .admin_ids
            .iter()
            .filter_map(|id| self.users.get(id))
            .map(|admin| FranchiseAdmin {
                id: admin.user.id,
                name: admin.user.name.clone(),
                email: admin.user.email.clone(),
            })
            .collect();

        let stores = row
            .stores
            .iter()
            .map(|(id, name)| Store {
                id: *id,
                name: name.clone(),
                total_revenue: self.store_revenue(*id),
            })
            .collect();

        Franchise {
            id: row.id,
            name: row.name.clone(),
            admins,
            stores,
        }
    }
}

fn hash_password(password: &str) -> Result<String, DataError> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| DataError::Internal(format!("failed to build salt: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DataError::Internal(format!("failed to hash password: {}", e)))
}

fn password_matches(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// In-process [`PizzaStore`]
#[derive(Default)]
pub struct MemoryPizzaStore {
    tables: RwLock<Tables>,
}

impl MemoryPizzaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the bootstrap admin account
    pub async fn seed_admin(&self, email: &str, password: &str) -> Result<User, DataError> {
        self.add_user("常用名字", email, password, vec![UserRole::new(Role::Admin)])
            .await
    }
}

#[async_trait]
impl PizzaStore for MemoryPizzaStore {
    async fn add_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        roles: Vec<UserRole>,
    ) -> Result<User, DataError> {
        let password_hash = hash_password(password)?;

        let mut tables = self.tables.write().await;
        if tables.user_by_email(email).is_some() {
            return Err(DataError::Invalid("email already registered".to_string()));
        }

        let user = User {
            id: tables.next_id(),
            name: name.to_string(),
            email: email.to_string(),
            roles,
        };
        tables.users.insert(
            user.id,
            UserRow {
                user: user.clone(),
                password_hash,
            },
        );

        Ok(user)
    }

    async fn get_user(&self, email: &str, password: &str) -> Result<User, DataError> {
        let unknown = || DataError::NotFound("unknown user".to_string());

        // Hash verification is slow; do it after the lock is released
        let (user, password_hash) = {
            let tables = self.tables.read().await;
            let row = tables.user_by_email(email).ok_or_else(unknown)?;
            (row.user.clone(), row.password_hash.clone())
        };

        if password_matches(password, &password_hash) {
            Ok(user)
        } else {
            Err(unknown())
        }
    }

    async fn update_user(
        &self,
        user_id: u64,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, DataError> {
        let password_hash = password.map(hash_password).transpose()?;

        let mut tables = self.tables.write().await;
        if let Some(email) = email {
            if tables
                .user_by_email(email)
                .is_some_and(|row| row.user.id != user_id)
            {
                return Err(DataError::Invalid("email already registered".to_string()));
            }
        }

        let row = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DataError::NotFound("unknown user".to_string()))?;

        if let Some(email) = email {
            row.user.email = email.to_string();
        }
        if let Some(hash) = password_hash {
            row.password_hash = hash;
        }

        Ok(row.user.clone())
    }

    async fn get_menu(&self) -> Result<Vec<MenuItem>, DataError> {
        Ok(self.tables.read().await.menu.values().cloned().collect())
    }

    async fn add_menu_item(&self, item: NewMenuItem) -> Result<MenuItem, DataError> {
        if item.title.trim().is_empty() {
            return Err(DataError::Invalid("menu item title is required".to_string()));
        }

        let mut tables = self.tables.write().await;
        let item = MenuItem {
            id: tables.next_id(),
            title: item.title,
            description: item.description,
            image: item.image,
            price: item.price,
        };
        tables.menu.insert(item.id, item.clone());

        Ok(item)
    }

    async fn get_orders(&self, diner_id: u64, page: u32) -> Result<OrderPage, DataError> {
        let page = page.max(1);
        let offset = (page as usize - 1) * ORDERS_PER_PAGE;

        let tables = self.tables.read().await;
        let orders = tables
            .orders
            .iter()
            .filter(|row| row.diner_id == diner_id)
            .skip(offset)
            .take(ORDERS_PER_PAGE)
            .map(|row| row.order.clone())
            .collect();

        Ok(OrderPage {
            diner_id,
            orders,
            page,
        })
    }

    async fn add_diner_order(&self, diner_id: u64, order: NewOrder) -> Result<Order, DataError> {
        let mut tables = self.tables.write().await;

        let store_exists = tables
            .franchises
            .get(&order.franchise_id)
            .is_some_and(|franchise| franchise.stores.contains_key(&order.store_id));
        if !store_exists {
            return Err(DataError::NotFound("unknown store".to_string()));
        }

        if let Some(item) = order
            .items
            .iter()
            .find(|item| !tables.menu.contains_key(&item.menu_id))
        {
            return Err(DataError::Invalid(format!(
                "unknown menu item {}",
                item.menu_id
            )));
        }

        let order = Order {
            id: tables.next_id(),
            franchise_id: order.franchise_id,
            store_id: order.store_id,
            date: chrono::Utc::now(),
            items: order.items,
        };
        tables.orders.push(OrderRow {
            diner_id,
            order: order.clone(),
        });

        Ok(order)
    }

    async fn get_franchises(&self) -> Result<Vec<Franchise>, DataError> {
        let tables = self.tables.read().await;
        Ok(tables
            .franchises
            .values()
            .map(|row| tables.franchise(row))
            .collect())
    }

    async fn get_user_franchises(&self, user_id: u64) -> Result<Vec<Franchise>, DataError> {
        let tables = self.tables.read().await;
        Ok(tables
            .franchises
            .values()
            .filter(|row| row.admin_ids.contains(&user_id))
            .map(|row| tables.franchise(row))
            .collect())
    }

    async fn get_franchise(&self, franchise_id: u64) -> Result<Option<Franchise>, DataError> {
        let tables = self.tables.read().await;
        Ok(tables
            .franchises
            .get(&franchise_id)
            .map(|row| tables.franchise(row)))
    }

    async fn create_franchise(&self, franchise: NewFranchise) -> Result<Franchise, DataError> {
        let mut tables = self.tables.write().await;

        let mut admin_ids = Vec::with_capacity(franchise.admins.len());
        for admin in &franchise.admins {
            let row = tables.user_by_email(&admin.email).ok_or_else(|| {
                DataError::NotFound(format!(
                    "unknown user for franchise admin {} provided",
                    admin.email
                ))
            })?;
            admin_ids.push(row.user.id);
        }

        let id = tables.next_id();
        for admin_id in &admin_ids {
            if let Some(row) = tables.users.get_mut(admin_id) {
                row.user.roles.push(UserRole {
                    role: Role::Franchisee,
                    object_id: Some(id),
                });
            }
        }

        let row = FranchiseRow {
            id,
            name: franchise.name,
            admin_ids,
            stores: BTreeMap::new(),
        };
        let created = tables.franchise(&row);
        tables.franchises.insert(id, row);

        Ok(created)
    }

    async fn delete_franchise(&self, franchise_id: u64) -> Result<(), DataError> {
        let mut tables = self.tables.write().await;

        if let Some(row) = tables.franchises.remove(&franchise_id) {
            for admin_id in row.admin_ids {
                if let Some(user) = tables.users.get_mut(&admin_id) {
                    user.user.roles.retain(|r| {
                        !(r.role == Role::Franchisee && r.object_id == Some(franchise_id))
                    });
                }
            }
        }

        Ok(())
    }

    async fn create_store(&self, franchise_id: u64, store: NewStore) -> Result<Store, DataError> {
        let mut tables = self.tables.write().await;
        if !tables.franchises.contains_key(&franchise_id) {
            return Err(DataError::NotFound("unknown franchise".to_string()));
        }

        let id = tables.next_id();
        if let Some(franchise) = tables.franchises.get_mut(&franchise_id) {
            franchise.stores.insert(id, store.name.clone());
        }

        Ok(Store {
            id,
            name: store.name,
            total_revenue: 0.0,
        })
    }

    async fn delete_store(&self, franchise_id: u64, store_id: u64) -> Result<(), DataError> {
        let mut tables = self.tables.write().await;
        if let Some(franchise) = tables.franchises.get_mut(&franchise_id) {
            franchise.stores.remove(&store_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdminRef, OrderItem};
    use std::sync::Arc;

    async fn store_with_franchisee() -> (MemoryPizzaStore, User, Franchise) {
        let db = MemoryPizzaStore::new();
        let owner = db
            .add_user("pizza franchisee", "f@jwt.com", "franchisee", vec![UserRole::new(Role::Diner)])
            .await
            .unwrap();
        let franchise = db
            .create_franchise(NewFranchise {
                name: "pizzaPocket".to_string(),
                admins: vec![AdminRef {
                    email: "f@jwt.com".to_string(),
                }],
            })
            .await
            .unwrap();
        (db, owner, franchise)
    }

    #[tokio::test]
    async fn test_user_credentials() {
        let db = MemoryPizzaStore::new();
        let user = db
            .add_user("pizza diner", "d@jwt.com", "diner", vec![UserRole::new(Role::Diner)])
            .await
            .unwrap();

        assert_eq!(db.get_user("d@jwt.com", "diner").await.unwrap(), user);
        assert!(matches!(
            db.get_user("d@jwt.com", "wrong").await,
            Err(DataError::NotFound(msg)) if msg == "unknown user"
        ));
        assert!(matches!(
            db.get_user("nobody@jwt.com", "diner").await,
            Err(DataError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_logins_run_alongside_writers() {
        let db = Arc::new(MemoryPizzaStore::new());
        db.add_user("pizza diner", "d@jwt.com", "diner", vec![]).await.unwrap();

        let logins: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                tokio::spawn(async move { db.get_user("d@jwt.com", "diner").await })
            })
            .collect();
        let registration = {
            let db = Arc::clone(&db);
            tokio::spawn(async move { db.add_user("other", "o@jwt.com", "other", vec![]).await })
        };

        for login in logins {
            assert_eq!(login.await.unwrap().unwrap().email, "d@jwt.com");
        }
        registration.await.unwrap().unwrap();
        assert!(db.get_user("o@jwt.com", "other").await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = MemoryPizzaStore::new();
        db.add_user("a", "a@jwt.com", "pw", vec![]).await.unwrap();
        assert!(matches!(
            db.add_user("b", "a@jwt.com", "pw", vec![]).await,
            Err(DataError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_update_user_password() {
        let db = MemoryPizzaStore::new();
        let user = db.add_user("a", "a@jwt.com", "old", vec![]).await.unwrap();

        let updated = db
            .update_user(user.id, Some("b@jwt.com"), Some("new"))
            .await
            .unwrap();
        assert_eq!(updated.email, "b@jwt.com");
        assert!(db.get_user("b@jwt.com", "new").await.is_ok());
        assert!(db.get_user("b@jwt.com", "old").await.is_err());
        assert!(matches!(
            db.update_user(999, None, None).await,
            Err(DataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_franchise_grants_role() {
        let (db, owner, franchise) = store_with_franchisee().await;

        assert_eq!(franchise.admins[0].email, "f@jwt.com");
        assert!(franchise.is_admin(owner.id));

        let owner = db.get_user("f@jwt.com", "franchisee").await.unwrap();
        assert!(owner.roles.contains(&UserRole {
            role: Role::Franchisee,
            object_id: Some(franchise.id),
        }));

        assert_eq!(db.get_user_franchises(owner.id).await.unwrap().len(), 1);

        db.delete_franchise(franchise.id).await.unwrap();
        assert!(db.get_franchise(franchise.id).await.unwrap().is_none());
        let owner = db.get_user("f@jwt.com", "franchisee").await.unwrap();
        assert!(!owner.roles.iter().any(|r| r.role == Role::Franchisee));
    }

    #[tokio::test]
    async fn test_create_franchise_unknown_admin() {
        let db = MemoryPizzaStore::new();
        let result = db
            .create_franchise(NewFranchise {
                name: "x".to_string(),
                admins: vec![AdminRef {
                    email: "ghost@jwt.com".to_string(),
                }],
            })
            .await;
        assert!(matches!(result, Err(DataError::NotFound(_))));
        assert!(db.get_franchises().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orders_update_store_revenue_and_page() {
        let (db, _, franchise) = store_with_franchisee().await;
        let store = db
            .create_store(franchise.id, NewStore { name: "SLC".to_string() })
            .await
            .unwrap();
        let veggie = db
            .add_menu_item(NewMenuItem {
                title: "Veggie".to_string(),
                description: "A garden of delight".to_string(),
                image: "pizza1.png".to_string(),
                price: 0.0038,
            })
            .await
            .unwrap();

        for _ in 0..(ORDERS_PER_PAGE + 2) {
            db.add_diner_order(
                7,
                NewOrder {
                    franchise_id: franchise.id,
                    store_id: store.id,
                    items: vec![OrderItem {
                        menu_id: veggie.id,
                        description: "Veggie".to_string(),
                        price: 0.5,
                    }],
                },
            )
            .await
            .unwrap();
        }

        let first = db.get_orders(7, 1).await.unwrap();
        assert_eq!(first.orders.len(), ORDERS_PER_PAGE);
        let second = db.get_orders(7, 2).await.unwrap();
        assert_eq!(second.orders.len(), 2);
        assert_eq!(second.page, 2);
        assert!(db.get_orders(8, 1).await.unwrap().orders.is_empty());

        let franchise = db.get_franchise(franchise.id).await.unwrap().unwrap();
        assert_eq!(franchise.stores[0].total_revenue, 6.0);
    }

    #[tokio::test]
    async fn test_order_for_unknown_store() {
        let db = MemoryPizzaStore::new();
        let result = db
            .add_diner_order(
                1,
                NewOrder {
                    franchise_id: 1,
                    store_id: 1,
                    items: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(DataError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_store() {
        let (db, _, franchise) = store_with_franchisee().await;
        let store = db
            .create_store(franchise.id, NewStore { name: "SLC".to_string() })
            .await
            .unwrap();
        db.delete_store(franchise.id, store.id).await.unwrap();
        assert!(db.get_franchise(franchise.id).await.unwrap().unwrap().stores.is_empty());
        assert!(matches!(
            db.create_store(999, NewStore { name: "x".to_string() }).await,
            Err(DataError::NotFound(_))
        ));
    }
}
