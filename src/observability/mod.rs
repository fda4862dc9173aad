//! Metrics, host sampling, log shipping and their export to remote backends.
//!
//! ```text
//! handlers ──▶ MetricsRegistry ──snapshot──▶ MetricsFlusher ──▶ TelemetryExporter (OTLP JSON)
//! handlers ──▶ RequestLogger ──batch──▶ LogSink = TelemetryExporter (Loki push)
//! ```

pub mod exporter;
pub mod flusher;
pub mod host;
pub mod middleware;
pub mod redact;
pub mod registry;
pub mod request_logger;
pub mod wire;

pub use exporter::{LogsEndpoint, MetricsEndpoint, TelemetryError, TelemetryExporter};
pub use flusher::MetricsFlusher;
pub use middleware::{instrument, Instrumentation};
pub use registry::{Accumulator, Counter, LatencyBucket, MetricsRegistry, MetricsSnapshot};
pub use request_logger::{LogLevel, LogRecord, LogSink, LogType, RequestLogger, RequestSummary};
