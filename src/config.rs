use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
    pub factory: FactoryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `text` or `json`
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Seeded into the store on startup when both are set
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL for the session store; sessions stay in memory when unset
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub url: String,
    pub api_key: String,
    pub source: String,
    pub flush_period_ms: u64,
    pub timeout_ms: Option<u64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            api_key: String::new(),
            source: "pizza-service".to_string(),
            flush_period_ms: 10_000,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub url: String,
    pub user_id: String,
    pub api_key: String,
    pub source: String,
    pub timeout_ms: Option<u64>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            user_id: String::new(),
            api_key: String::new(),
            source: "pizza-service".to_string(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FactoryConfig {
    pub url: String,
    pub api_key: String,
}

/// Load configuration from `path` (optional) layered with `PIZZA_SERVICE__*` env vars
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("PIZZA_SERVICE").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.auth.jwt_secret.is_empty() {
        anyhow::bail!("auth.jwt_secret must be set");
    }

    if cfg.metrics.flush_period_ms == 0 {
        anyhow::bail!("metrics.flush_period_ms must be greater than zero");
    }

    if cfg.metrics.enabled && cfg.metrics.url.is_empty() {
        anyhow::bail!("metrics.url is required when metrics are enabled");
    }

    if cfg.logging.enabled && cfg.logging.url.is_empty() {
        anyhow::bail!("logging.url is required when log shipping is enabled");
    }

    if cfg.auth.admin_email.is_some() != cfg.auth.admin_password.is_some() {
        anyhow::bail!("auth.admin_email and auth.admin_password must be set together");
    }

    Ok(())
}

impl Config {
    /// Copy of the configuration safe to print
    pub fn redacted(&self) -> Config {
        let mut cfg = self.clone();
        cfg.auth.jwt_secret = mask_secret(&cfg.auth.jwt_secret);
        cfg.auth.admin_password = cfg.auth.admin_password.as_deref().map(mask_secret);
        cfg.metrics.api_key = mask_secret(&cfg.metrics.api_key);
        cfg.logging.api_key = mask_secret(&cfg.logging.api_key);
        cfg.factory.api_key = mask_secret(&cfg.factory.api_key);
        cfg
    }
}

/// Keep at most the first 4 characters of a secret
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    if visible.len() >= secret.len() {
        "***".to_string()
    } else {
        format!("{}***", visible)
    }
}
