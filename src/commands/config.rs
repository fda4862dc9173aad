use anyhow::Result;
use colored::Colorize;
use pizza_service::config;
use std::path::Path;

/// Print the effective configuration with secrets masked
pub fn show(config_path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());

    let cfg = config::load_config(config_path)?;

    println!("{}", "Current Configuration:".green().bold());
    println!();
    println!("{}", toml::to_string_pretty(&cfg.redacted())?);

    Ok(())
}

pub fn validate(config_path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());

    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Listen: {}:{}", cfg.server.host, cfg.server.port);
    println!(
        "  Session store: {}",
        if cfg.database.url.is_some() { "sqlite" } else { "memory" }
    );
    println!("  Metrics export: {}", on_off(cfg.metrics.enabled));
    println!("  Log export: {}", on_off(cfg.logging.enabled));

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}
