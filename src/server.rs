use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    auth::{self, AuthSessionManager, MemorySessionStore, SessionStore, SqliteSessionStore},
    config::Config,
    database::{MemoryPizzaStore, PizzaStore},
    factory::FactoryClient,
    handlers::{self, AppState},
    metrics,
    observability::{
        self, Instrumentation, LogSink, MetricsFlusher, MetricsRegistry, RequestLogger,
        TelemetryExporter,
    },
    signals::setup_signal_handlers,
};

/// Records per log push
const LOG_BATCH_SIZE: usize = 100;
/// Longest a log record waits before its batch is pushed
const LOG_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
/// How long shutdown waits for the last log batches
const LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the router and the background tasks share
pub struct Services {
    pub state: AppState,
    pub logger: RequestLogger,
    pub exporter: Arc<TelemetryExporter>,
    /// Finishes once every logger handle is dropped and pending records are pushed
    pub log_shipper: Option<JoinHandle<()>>,
}

/// Wire stores, telemetry and the factory client from configuration.
///
/// Spawns the log shipper when log export is enabled, so this must run
/// inside a tokio runtime.
pub async fn build_services(config: &Config) -> Result<Services> {
    let http_client = reqwest::Client::new();

    let exporter = Arc::new(TelemetryExporter::from_config(config, http_client.clone()));
    let (logger, log_shipper) = if exporter.logs_enabled() {
        let sink: Arc<dyn LogSink> = exporter.clone();
        let (logger, shipper) = RequestLogger::spawn_with_handle(
            &config.logging.source,
            sink,
            LOG_BATCH_SIZE,
            LOG_FLUSH_INTERVAL,
        );
        (logger, Some(shipper))
    } else {
        (RequestLogger::disabled(&config.logging.source), None)
    };

    let sessions: Arc<dyn SessionStore> = match &config.database.url {
        Some(url) => {
            info!("Using SQLite session store");
            Arc::new(
                SqliteSessionStore::connect(url)
                    .await?
                    .with_query_logger(logger.clone()),
            )
        }
        None => {
            info!("Using in-memory session store");
            Arc::new(MemorySessionStore::new())
        }
    };
    let auth = Arc::new(AuthSessionManager::new(&config.auth.jwt_secret, sessions));

    let store = MemoryPizzaStore::new();
    if let (Some(email), Some(password)) = (&config.auth.admin_email, &config.auth.admin_password) {
        store.seed_admin(email, password).await?;
        info!(email = %email, "Seeded admin account");
    }

    let registry = Arc::new(MetricsRegistry::new());
    let factory = Arc::new(FactoryClient::new(
        http_client,
        &config.factory.url,
        &config.factory.api_key,
        registry.clone(),
        logger.clone(),
    ));

    let store: Arc<dyn PizzaStore> = Arc::new(store);

    Ok(Services {
        state: AppState {
            auth,
            store,
            metrics: registry,
            factory,
        },
        logger,
        exporter,
        log_shipper,
    })
}

/// Start the pizza service and block until shutdown completes
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = Arc::new(metrics::init_metrics()?);

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let services = build_services(&config).await?;

    let flusher_handle = if services.exporter.metrics_enabled() {
        let flusher = MetricsFlusher::new(
            services.state.metrics.clone(),
            services.exporter.clone(),
            Duration::from_millis(config.metrics.flush_period_ms),
        );
        Some(flusher.spawn(shutdown_tx.subscribe()))
    } else {
        info!("Metrics export disabled");
        None
    };

    let app = create_router(services.state, services.logger, Some(metrics_handle));

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting pizza service on {}", addr);
    info!(
        metrics_export = config.metrics.enabled,
        log_export = config.logging.enabled,
        factory = %config.factory.url,
        "Telemetry configuration"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    if let Some(handle) = flusher_handle {
        handle.await?;
    }

    // The router, and with it every logger handle, is gone once serve returns
    if let Some(shipper) = services.log_shipper {
        info!("Flushing pending log records...");
        match tokio::time::timeout(LOG_DRAIN_TIMEOUT, shipper).await {
            Ok(joined) => joined?,
            Err(_) => warn!("Log shipper did not drain in time, dropping pending records"),
        }
    }
    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the router with all routes and middleware.
///
/// `/api` routes run through the instrumentation layer (outermost) and the
/// identity layer. `/metrics` is only mounted when a Prometheus handle is
/// supplied.
pub fn create_router(
    state: AppState,
    logger: RequestLogger,
    metrics_handle: Option<Arc<PrometheusHandle>>,
) -> Router {
    use handlers::{auth as auth_api, franchise, order};

    let instrumentation = Instrumentation {
        metrics: state.metrics.clone(),
        logger,
    };

    let api_routes = Router::new()
        .route(
            "/api/auth",
            post(auth_api::register)
                .put(auth_api::login)
                .delete(auth_api::logout),
        )
        .route("/api/auth/:id", put(auth_api::update_user))
        .route(
            "/api/order/menu",
            get(order::get_menu).put(order::add_menu_item),
        )
        .route(
            "/api/order",
            get(order::get_orders).post(order::create_order),
        )
        .route(
            "/api/franchise",
            get(franchise::list_franchises).post(franchise::create_franchise),
        )
        .route(
            "/api/franchise/:id",
            get(franchise::user_franchises).delete(franchise::delete_franchise),
        )
        .route("/api/franchise/:id/store", post(franchise::create_store))
        .route(
            "/api/franchise/:id/store/:store_id",
            axum::routing::delete(franchise::delete_store),
        )
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::resolve_identity,
        ))
        .layer(middleware::from_fn_with_state(
            instrumentation,
            observability::instrument,
        ))
        .with_state(state);

    let mut app = Router::new().route("/health", get(handlers::health::health_check));

    if let Some(handle) = metrics_handle {
        app = app.merge(
            Router::new()
                .route("/metrics", get(handlers::metrics_handler::metrics))
                .with_state(handle),
        );
    }

    app.merge(api_routes)
        .layer(DefaultBodyLimit::max(observability::middleware::MAX_LOGGED_BODY))
        .layer(TraceLayer::new_for_http())
}
