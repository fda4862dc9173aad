use anyhow::Result;
use colored::Colorize;
use pizza_service::{config, init_tracing, server};
use std::path::Path;
use tracing::info;

/// Load configuration, set up tracing and run the server until shutdown
pub async fn execute(config_path: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    init_tracing(&cfg.server.log_format);

    println!("{}", "Starting pizza service...".green());
    info!(config = %config_path.display(), "Configuration loaded");

    server::start_server(cfg).await
}
