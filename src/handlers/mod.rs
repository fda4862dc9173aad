pub mod auth;
pub mod franchise;
pub mod health;
pub mod metrics_handler;
pub mod order;

use std::sync::Arc;

use crate::auth::AuthSessionManager;
use crate::database::PizzaStore;
use crate::factory::FactoryClient;
use crate::observability::MetricsRegistry;

/// Shared state for the `/api` routes
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthSessionManager>,
    pub store: Arc<dyn PizzaStore>,
    pub metrics: Arc<MetricsRegistry>,
    pub factory: Arc<FactoryClient>,
}
