use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::exporter::TelemetryExporter;
use super::registry::MetricsRegistry;
use crate::signals::ShutdownSignal;

/// Periodically snapshots the registry and pushes it to the metrics backend.
///
/// At most one push is outstanding. A tick that lands while the previous
/// push is still running is skipped without taking a snapshot, so latency
/// samples carry over to the next flush. Every push is abandoned after
/// `push_deadline` (one period unless overridden), so a backend that never
/// answers costs a single flush.
pub struct MetricsFlusher {
    registry: Arc<MetricsRegistry>,
    exporter: Arc<TelemetryExporter>,
    period: Duration,
    push_deadline: Duration,
    in_flight: Arc<AtomicBool>,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Pushed,
    SkippedInFlight,
}

impl MetricsFlusher {
    pub fn new(
        registry: Arc<MetricsRegistry>,
        exporter: Arc<TelemetryExporter>,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            exporter,
            period,
            push_deadline: period,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_push_deadline(mut self, deadline: Duration) -> Self {
        self.push_deadline = deadline;
        self
    }

    /// Run until a shutdown signal arrives (or its sender is dropped)
    pub fn spawn(self, mut shutdown: broadcast::Receiver<ShutdownSignal>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            tracing::info!(period_ms = self.period.as_millis() as u64, "Metrics flusher started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Metrics flusher stopping");
                        break;
                    }
                }
            }
        })
    }

    pub fn tick(&self) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Previous metrics push still running, skipping tick");
            return TickOutcome::SkippedInFlight;
        }

        let snapshot = self.registry.snapshot();
        let exporter = Arc::clone(&self.exporter);
        let in_flight = Arc::clone(&self.in_flight);
        let deadline = self.push_deadline;

        tokio::spawn(async move {
            match tokio::time::timeout(deadline, exporter.push_metrics(&snapshot)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Failed to push metrics"),
                Err(_) => tracing::warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Metrics push timed out"
                ),
            }
            in_flight.store(false, Ordering::Release);
        });

        TickOutcome::Pushed
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}
