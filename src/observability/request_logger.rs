//! Structured log records for HTTP exchanges, SQL statements and outbound calls
//!
//! Records are sanitized when built and handed to a background shipper that
//! batches them (by count or by time window) before pushing to a [`LogSink`].
//! Logging never blocks the caller and never fails a request.

use async_trait::async_trait;
use axum::http::{request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use super::exporter::TelemetryError;
use super::redact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// 5xx is an error, 4xx a warning, anything else informational
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            500..=u16::MAX => Self::Error,
            400..=499 => Self::Warn,
            _ => Self::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogType {
    Http,
    Sql,
    Api,
}

impl LogType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Sql => "sql",
            Self::Api => "api",
        }
    }
}

/// A sanitized log line ready to ship
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp_nanos: i64,
    pub component: String,
    pub level: LogLevel,
    pub log_type: LogType,
    /// Sanitized JSON text
    pub payload: String,
}

impl LogRecord {
    pub fn new(component: &str, level: LogLevel, log_type: LogType, payload: Value) -> Self {
        let now = chrono::Utc::now();
        Self {
            timestamp_nanos: now
                .timestamp_nanos_opt()
                .unwrap_or_else(|| now.timestamp_micros() * 1_000),
            component: component.to_string(),
            level,
            log_type,
            payload: redact::sanitize(payload).to_string(),
        }
    }
}

/// The parts of an inbound request the logger records
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub authorized: bool,
    pub path: String,
    pub method: String,
    pub body: String,
}

impl RequestSummary {
    pub fn from_parts(parts: &request::Parts, body: &[u8]) -> Self {
        Self {
            authorized: parts.headers.contains_key(axum::http::header::AUTHORIZATION),
            path: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| parts.uri.path().to_string()),
            method: parts.method.to_string(),
            body: body_text(body),
        }
    }
}

fn body_text(body: &[u8]) -> String {
    if body.is_empty() {
        "{}".to_string()
    } else {
        String::from_utf8_lossy(body).into_owned()
    }
}

/// Destination of shipped log batches
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    async fn ship(&self, records: Vec<LogRecord>) -> Result<(), TelemetryError>;
}

/// Non-blocking handle to the log shipper
#[derive(Clone)]
pub struct RequestLogger {
    component: Arc<str>,
    sender: Option<mpsc::UnboundedSender<LogRecord>>,
}

impl RequestLogger {
    /// Spawn the background shipper. Must be called inside a tokio runtime.
    pub fn spawn(
        component: &str,
        sink: Arc<dyn LogSink>,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Self {
        Self::spawn_with_handle(component, sink, batch_size, flush_interval).0
    }

    /// Like [`RequestLogger::spawn`], also returning the shipper task.
    ///
    /// The task finishes once every logger handle is dropped and all pending
    /// records have been pushed, so awaiting it drains the log pipeline.
    pub fn spawn_with_handle(
        component: &str,
        sink: Arc<dyn LogSink>,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            shipper_task(sink, rx, batch_size.max(1), flush_interval).await;
        });

        let logger = Self {
            component: Arc::from(component),
            sender: Some(tx),
        };
        (logger, handle)
    }

    /// A logger that drops every record
    pub fn disabled(component: &str) -> Self {
        Self {
            component: Arc::from(component),
            sender: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// One record per completed HTTP exchange, level derived from `status`
    pub fn log_http_exchange(
        &self,
        request: &RequestSummary,
        status: StatusCode,
        response_body: &[u8],
    ) {
        self.log(
            LogLevel::from_status(status),
            LogType::Http,
            json!({
                "authorized": request.authorized,
                "path": request.path,
                "method": request.method,
                "statusCode": status.as_u16(),
                "reqBody": request.body,
                "resBody": body_text(response_body),
            }),
        );
    }

    pub fn log_sql_event(&self, query: &str) {
        self.log(LogLevel::Info, LogType::Sql, json!({ "query": query }));
    }

    /// Record an outbound call to another service
    pub fn log_api_call(&self, target: &str, request: &Value) {
        self.log(
            LogLevel::Info,
            LogType::Api,
            json!({ "target": target, "call": request.to_string() }),
        );
    }

    fn log(&self, level: LogLevel, log_type: LogType, payload: Value) {
        let Some(sender) = &self.sender else {
            return;
        };
        let record = LogRecord::new(&self.component, level, log_type, payload);
        // Shipper gone means shutdown is under way
        let _ = sender.send(record);
    }
}

async fn shipper_task(
    sink: Arc<dyn LogSink>,
    mut rx: mpsc::UnboundedReceiver<LogRecord>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch: Vec<LogRecord> = Vec::with_capacity(batch_size);
    let mut pushes = JoinSet::new();

    let mut flush_timer = tokio::time::interval(flush_interval);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(record) => {
                    batch.push(record);
                    if batch.len() >= batch_size {
                        ship(&sink, &mut batch, &mut pushes);
                    }
                }
                // Every logger handle dropped
                None => break,
            },

            _ = flush_timer.tick() => {
                ship(&sink, &mut batch, &mut pushes);
                while pushes.try_join_next().is_some() {}
            }
        }
    }

    if !batch.is_empty() {
        push(sink, std::mem::take(&mut batch)).await;
    }
    while pushes.join_next().await.is_some() {}

    tracing::debug!("Log shipper shutting down");
}

/// Push the batch on its own task so a slow backend never stalls intake
fn ship(sink: &Arc<dyn LogSink>, batch: &mut Vec<LogRecord>, pushes: &mut JoinSet<()>) {
    if batch.is_empty() {
        return;
    }

    pushes.spawn(push(Arc::clone(sink), std::mem::take(batch)));
}

async fn push(sink: Arc<dyn LogSink>, records: Vec<LogRecord>) {
    let count = records.len();
    if let Err(e) = sink.ship(records).await {
        tracing::warn!(error = %e, count = count, "Failed to ship log batch");
    }
}
