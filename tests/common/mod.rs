#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use pizza_service::{
    auth::{AuthSessionManager, MemorySessionStore},
    database::{MemoryPizzaStore, PizzaStore},
    factory::FactoryClient,
    handlers::AppState,
    observability::{host::HostStats, MetricsRegistry, RequestLogger},
    server::create_router,
};

pub const ADMIN_EMAIL: &str = "a@jwt.com";
pub const ADMIN_PASSWORD: &str = "admin";
pub const FACTORY_KEY: &str = "factory-key";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

/// Router over in-memory stores with a seeded admin and a quiet host sampler
pub async fn test_app(factory_url: &str) -> TestApp {
    test_app_with_logger(factory_url, RequestLogger::disabled("test")).await
}

pub async fn test_app_with_logger(factory_url: &str, logger: RequestLogger) -> TestApp {
    let metrics = Arc::new(MetricsRegistry::with_host_sampler(HostStats::default));
    let auth = Arc::new(AuthSessionManager::new(
        "test-secret",
        Arc::new(MemorySessionStore::new()),
    ));

    let store = MemoryPizzaStore::new();
    store.seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    let store: Arc<dyn PizzaStore> = Arc::new(store);

    let factory = Arc::new(FactoryClient::new(
        reqwest::Client::new(),
        factory_url,
        FACTORY_KEY,
        metrics.clone(),
        logger.clone(),
    ));

    let state = AppState {
        auth,
        store,
        metrics,
        factory,
    };

    TestApp {
        app: create_router(state.clone(), logger, None),
        state,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.dispatch(request).await
    }

    /// Send `body` verbatim, with `content_type` if given
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        self.dispatch(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    /// Register a diner and return its token
    pub async fn register(&self, name: &str, email: &str, password: &str) -> (u64, String) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth",
                None,
                Some(serde_json::json!({ "name": name, "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);

        (
            body["user"]["id"].as_u64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::PUT,
            "/api/auth",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn admin_token(&self) -> String {
        let (status, body) = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}
