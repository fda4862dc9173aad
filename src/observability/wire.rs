//! Ingestion schemas of the two telemetry backends.
//!
//! Metrics use the OTLP/HTTP JSON layout; logs use the Loki push layout.

use serde::Serialize;
use std::collections::BTreeMap;

use super::registry::{MetricKind, MetricPoint, MetricValue, MetricsSnapshot};
use super::request_logger::LogRecord;

pub const CUMULATIVE: &str = "AGGREGATION_TEMPORALITY_CUMULATIVE";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPush {
    pub resource_metrics: Vec<ResourceMetrics>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    pub scope_metrics: Vec<ScopeMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeMetrics {
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
    pub unit: String,
    #[serde(flatten)]
    pub data: MetricData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricData {
    Gauge(Gauge),
    Sum(Sum),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gauge {
    pub data_points: Vec<DataPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sum {
    pub data_points: Vec<DataPoint>,
    pub aggregation_temporality: &'static str,
    pub is_monotonic: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    #[serde(flatten)]
    pub value: NumberValue,
    pub time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberValue {
    AsInt(i64),
    AsDouble(f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnyValue {
    pub string_value: String,
}

impl MetricsPush {
    /// One batch holding every point of `snapshot`, tagged with `source`
    pub fn from_snapshot(snapshot: &MetricsSnapshot, source: &str) -> Self {
        let metrics = snapshot
            .points()
            .into_iter()
            .map(|point| to_metric(point, snapshot.taken_at_nanos, source))
            .collect();

        Self {
            resource_metrics: vec![ResourceMetrics {
                scope_metrics: vec![ScopeMetrics { metrics }],
            }],
        }
    }
}

fn to_metric(point: MetricPoint, time_unix_nano: u64, source: &str) -> Metric {
    let data_points = vec![DataPoint {
        value: match point.value {
            MetricValue::Int(v) => NumberValue::AsInt(v),
            MetricValue::Double(v) => NumberValue::AsDouble(v),
        },
        time_unix_nano,
        attributes: vec![KeyValue {
            key: "source".to_string(),
            value: AnyValue {
                string_value: source.to_string(),
            },
        }],
    }];

    let data = match point.kind {
        MetricKind::Gauge => MetricData::Gauge(Gauge { data_points }),
        MetricKind::CumulativeSum => MetricData::Sum(Sum {
            data_points,
            aggregation_temporality: CUMULATIVE,
            is_monotonic: true,
        }),
    };

    Metric {
        name: point.name.to_string(),
        unit: point.unit.to_string(),
        data,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsPush {
    pub streams: Vec<LogStream>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct StreamLabels {
    pub component: String,
    pub level: String,
    #[serde(rename = "type")]
    pub log_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogStream {
    pub stream: StreamLabels,
    /// `[timestamp_nanos, line]` pairs
    pub values: Vec<[String; 2]>,
}

impl LogsPush {
    /// Group records into one stream per label set, preserving record order
    pub fn from_records(records: &[LogRecord]) -> Self {
        let mut streams: BTreeMap<StreamLabels, Vec<[String; 2]>> = BTreeMap::new();

        for record in records {
            let labels = StreamLabels {
                component: record.component.clone(),
                level: record.level.as_str().to_string(),
                log_type: record.log_type.as_str().to_string(),
            };
            streams
                .entry(labels)
                .or_default()
                .push([record.timestamp_nanos.to_string(), record.payload.clone()]);
        }

        Self {
            streams: streams
                .into_iter()
                .map(|(stream, values)| LogStream { stream, values })
                .collect(),
        }
    }
}
