//! Push-based export of metric snapshots and log batches.
//!
//! Both backends are best-effort: a failed or rejected push is reported to
//! the caller as a [`TelemetryError`], and the background callers log it and
//! move on. Nothing here is retried.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::registry::MetricsSnapshot;
use super::request_logger::{LogRecord, LogSink};
use super::wire::{LogsPush, MetricsPush};
use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("telemetry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telemetry backend rejected push ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{0} export is not configured")]
    NotConfigured(&'static str),
}

#[derive(Debug, Clone)]
pub struct MetricsEndpoint {
    pub url: String,
    pub api_key: String,
    pub source: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct LogsEndpoint {
    pub url: String,
    pub user_id: String,
    pub api_key: String,
    pub timeout: Option<Duration>,
}

pub struct TelemetryExporter {
    client: reqwest::Client,
    metrics: Option<MetricsEndpoint>,
    logs: Option<LogsEndpoint>,
}

impl TelemetryExporter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            metrics: None,
            logs: None,
        }
    }

    pub fn with_metrics(mut self, endpoint: MetricsEndpoint) -> Self {
        self.metrics = Some(endpoint);
        self
    }

    pub fn with_logs(mut self, endpoint: LogsEndpoint) -> Self {
        self.logs = Some(endpoint);
        self
    }

    /// Configure whichever backends are enabled in `config`
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let mut exporter = Self::new(client);

        if config.metrics.enabled {
            exporter = exporter.with_metrics(MetricsEndpoint {
                url: config.metrics.url.clone(),
                api_key: config.metrics.api_key.clone(),
                source: config.metrics.source.clone(),
                timeout: config.metrics.timeout_ms.map(Duration::from_millis),
            });
        }

        if config.logging.enabled {
            exporter = exporter.with_logs(LogsEndpoint {
                url: config.logging.url.clone(),
                user_id: config.logging.user_id.clone(),
                api_key: config.logging.api_key.clone(),
                timeout: config.logging.timeout_ms.map(Duration::from_millis),
            });
        }

        exporter
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }

    pub fn logs_enabled(&self) -> bool {
        self.logs.is_some()
    }

    /// Send every point of `snapshot` in a single request
    pub async fn push_metrics(&self, snapshot: &MetricsSnapshot) -> Result<(), TelemetryError> {
        let endpoint = self
            .metrics
            .as_ref()
            .ok_or(TelemetryError::NotConfigured("metrics"))?;

        let body = MetricsPush::from_snapshot(snapshot, &endpoint.source);

        let mut request = self
            .client
            .post(&endpoint.url)
            .bearer_auth(&endpoint.api_key)
            .json(&body);
        if let Some(timeout) = endpoint.timeout {
            request = request.timeout(timeout);
        }

        check(request.send().await?).await?;

        tracing::debug!(url = %endpoint.url, "Pushed metrics snapshot");
        Ok(())
    }

    pub async fn push_logs(&self, records: &[LogRecord]) -> Result<(), TelemetryError> {
        let endpoint = self
            .logs
            .as_ref()
            .ok_or(TelemetryError::NotConfigured("logs"))?;

        if records.is_empty() {
            return Ok(());
        }

        let body = LogsPush::from_records(records);

        let mut request = self
            .client
            .post(&endpoint.url)
            .bearer_auth(format!("{}:{}", endpoint.user_id, endpoint.api_key))
            .json(&body);
        if let Some(timeout) = endpoint.timeout {
            request = request.timeout(timeout);
        }

        check(request.send().await?).await?;

        tracing::debug!(count = records.len(), "Pushed log batch");
        Ok(())
    }

    /// Push on a detached task; failures are logged and dropped
    pub fn spawn_push_metrics(self: &Arc<Self>, snapshot: MetricsSnapshot) -> JoinHandle<()> {
        let exporter = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = exporter.push_metrics(&snapshot).await {
                tracing::warn!(error = %e, "Failed to push metrics");
            }
        })
    }
}

async fn check(response: reqwest::Response) -> Result<(), TelemetryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(TelemetryError::Rejected { status, body })
}

#[async_trait]
impl LogSink for TelemetryExporter {
    async fn ship(&self, records: Vec<LogRecord>) -> Result<(), TelemetryError> {
        self.push_logs(&records).await
    }
}
