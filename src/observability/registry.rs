//! Process-wide request/business counters with periodic snapshotting.
//!
//! Counters and the revenue accumulator are cumulative since start. Latency
//! samples are drained by every [`MetricsRegistry::snapshot`] call. Every
//! mutation is mirrored into the `metrics` facade so the Prometheus scrape
//! endpoint sees the same numbers.

use axum::http::Method;
use metrics::{counter, gauge, histogram};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::host::{self, HostStats};

/// Monotonic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    PostRequests,
    GetRequests,
    PutRequests,
    DeleteRequests,
    AuthSuccess,
    AuthFailure,
    PizzasSold,
    CreationFailures,
}

impl Counter {
    pub const ALL: [Counter; 8] = [
        Counter::PostRequests,
        Counter::GetRequests,
        Counter::PutRequests,
        Counter::DeleteRequests,
        Counter::AuthSuccess,
        Counter::AuthFailure,
        Counter::PizzasSold,
        Counter::CreationFailures,
    ];

    /// Name on the telemetry wire
    pub fn name(self) -> &'static str {
        match self {
            Counter::PostRequests => "post_requests",
            Counter::GetRequests => "get_requests",
            Counter::PutRequests => "put_requests",
            Counter::DeleteRequests => "delete_requests",
            Counter::AuthSuccess => "success_auth_attempts",
            Counter::AuthFailure => "failed_auth_attempts",
            Counter::PizzasSold => "pizzas_sold",
            Counter::CreationFailures => "creation_failures",
        }
    }

    fn prometheus_name(self) -> &'static str {
        match self {
            Counter::PostRequests => "pizza_post_requests_total",
            Counter::GetRequests => "pizza_get_requests_total",
            Counter::PutRequests => "pizza_put_requests_total",
            Counter::DeleteRequests => "pizza_delete_requests_total",
            Counter::AuthSuccess => "pizza_success_auth_attempts_total",
            Counter::AuthFailure => "pizza_failed_auth_attempts_total",
            Counter::PizzasSold => "pizza_pizzas_sold_total",
            Counter::CreationFailures => "pizza_creation_failures_total",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    pub fn for_method(method: &Method) -> Option<Counter> {
        match *method {
            Method::POST => Some(Counter::PostRequests),
            Method::GET => Some(Counter::GetRequests),
            Method::PUT => Some(Counter::PutRequests),
            Method::DELETE => Some(Counter::DeleteRequests),
            _ => None,
        }
    }
}

/// Floating-point running totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulator {
    Revenue,
}

/// Latency sample lists, cleared on every snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBucket {
    Endpoint,
    Fulfillment,
}

impl LatencyBucket {
    pub fn name(self) -> &'static str {
        match self {
            LatencyBucket::Endpoint => "endpoint_latency",
            LatencyBucket::Fulfillment => "pizza_latency",
        }
    }

    fn prometheus_name(self) -> &'static str {
        match self {
            LatencyBucket::Endpoint => "pizza_endpoint_latency_ms",
            LatencyBucket::Fulfillment => "pizza_factory_latency_ms",
        }
    }
}

#[derive(Debug, Default)]
struct Samples {
    revenue: f64,
    endpoint: Vec<f64>,
    fulfillment: Vec<f64>,
}

impl Samples {
    fn bucket_mut(&mut self, bucket: LatencyBucket) -> &mut Vec<f64> {
        match bucket {
            LatencyBucket::Endpoint => &mut self.endpoint,
            LatencyBucket::Fulfillment => &mut self.fulfillment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricKind {
    Gauge,
    /// Monotonic running total since process start
    CumulativeSum,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Double(f64),
}

/// One named value of a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: &'static str,
    pub unit: &'static str,
    pub kind: MetricKind,
    pub value: MetricValue,
}

/// Point-in-time view of the registry
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub taken_at_nanos: u64,
    counters: [u64; Counter::ALL.len()],
    pub revenue: f64,
    pub active_users: i64,
    pub endpoint_latency_ms: f64,
    pub fulfillment_latency_ms: f64,
    pub host: HostStats,
}

impl MetricsSnapshot {
    pub fn counter(&self, counter: Counter) -> u64 {
        self.counters[counter.index()]
    }

    pub fn latency(&self, bucket: LatencyBucket) -> f64 {
        match bucket {
            LatencyBucket::Endpoint => self.endpoint_latency_ms,
            LatencyBucket::Fulfillment => self.fulfillment_latency_ms,
        }
    }

    /// Flatten into named, typed values in export order
    pub fn points(&self) -> Vec<MetricPoint> {
        let mut points = vec![
            MetricPoint {
                name: "cpu",
                unit: "%",
                kind: MetricKind::Gauge,
                value: MetricValue::Double(self.host.cpu_percent),
            },
            MetricPoint {
                name: "memory",
                unit: "%",
                kind: MetricKind::Gauge,
                value: MetricValue::Double(self.host.memory_percent),
            },
        ];

        points.extend(Counter::ALL.iter().map(|&c| MetricPoint {
            name: c.name(),
            unit: "count",
            kind: MetricKind::CumulativeSum,
            value: MetricValue::Int(self.counter(c) as i64),
        }));

        points.extend([
            MetricPoint {
                name: "active_users",
                unit: "count",
                kind: MetricKind::Gauge,
                value: MetricValue::Int(self.active_users),
            },
            MetricPoint {
                name: "revenue",
                unit: "₿",
                kind: MetricKind::CumulativeSum,
                value: MetricValue::Double(self.revenue),
            },
            MetricPoint {
                name: LatencyBucket::Endpoint.name(),
                unit: "ms",
                kind: MetricKind::Gauge,
                value: MetricValue::Double(self.endpoint_latency_ms),
            },
            MetricPoint {
                name: LatencyBucket::Fulfillment.name(),
                unit: "ms",
                kind: MetricKind::Gauge,
                value: MetricValue::Double(self.fulfillment_latency_ms),
            },
        ]);

        points
    }
}

/// Shared registry injected into every request path.
///
/// Counters and the gauge are lock-free atomics; revenue and the latency
/// lists sit behind one mutex so a snapshot reads and clears them together.
pub struct MetricsRegistry {
    counters: [AtomicU64; Counter::ALL.len()],
    active_users: AtomicI64,
    samples: Mutex<Samples>,
    host_sampler: fn() -> HostStats,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_host_sampler(host::sample)
    }

    pub fn with_host_sampler(host_sampler: fn() -> HostStats) -> Self {
        Self {
            counters: Default::default(),
            active_users: AtomicI64::new(0),
            samples: Mutex::new(Samples::default()),
            host_sampler,
        }
    }

    fn samples(&self) -> MutexGuard<'_, Samples> {
        // Samples stay consistent even if a holder panicked
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn increment(&self, counter: Counter) {
        self.increment_by(counter, 1);
    }

    pub fn increment_by(&self, counter: Counter, amount: u64) {
        self.counters[counter.index()].fetch_add(amount, Ordering::Relaxed);
        counter!(counter.prometheus_name()).increment(amount);
    }

    /// Count an inbound request by verb; other verbs are not tracked
    pub fn record_request(&self, method: &Method) {
        if let Some(counter) = Counter::for_method(method) {
            self.increment(counter);
        }
    }

    pub fn add(&self, accumulator: Accumulator, amount: f64) {
        match accumulator {
            Accumulator::Revenue => {
                self.samples().revenue += amount;
                gauge!("pizza_revenue_total").increment(amount);
            }
        }
    }

    pub fn record_latency(&self, bucket: LatencyBucket, millis: f64) {
        self.samples().bucket_mut(bucket).push(millis);
        histogram!(bucket.prometheus_name()).record(millis);
    }

    pub fn user_logged_in(&self) {
        self.active_users.fetch_add(1, Ordering::Relaxed);
        gauge!("pizza_active_users").increment(1.0);
    }

    /// Never drops the gauge below zero; sessions issued before a restart
    /// can still log out.
    pub fn user_logged_out(&self) {
        let result = self
            .active_users
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n > 0).then(|| n - 1)
            });

        match result {
            Ok(_) => gauge!("pizza_active_users").decrement(1.0),
            Err(_) => tracing::debug!("Logout with no active users recorded"),
        }
    }

    pub fn active_users(&self) -> i64 {
        self.active_users.load(Ordering::Relaxed)
    }

    pub fn counter(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Read every value and drain the latency buckets in one step
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (revenue, endpoint, fulfillment) = {
            let mut samples = self.samples();
            (
                samples.revenue,
                std::mem::take(&mut samples.endpoint),
                std::mem::take(&mut samples.fulfillment),
            )
        };

        let mut counters = [0u64; Counter::ALL.len()];
        for counter in Counter::ALL {
            counters[counter.index()] = self.counter(counter);
        }

        MetricsSnapshot {
            taken_at_nanos: now_nanos(),
            counters,
            revenue,
            active_users: self.active_users(),
            endpoint_latency_ms: mean(&endpoint),
            fulfillment_latency_ms: mean(&fulfillment),
            host: (self.host_sampler)(),
        }
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn now_nanos() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .map(|n| n.max(0) as u64)
        .unwrap_or_default()
}
