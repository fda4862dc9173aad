pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod factory;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod server;
pub mod signals;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize process diagnostics.
///
/// `RUST_LOG` overrides the default `info` filter; `log_format = "json"`
/// switches to JSON lines. Can only be called once per process.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
