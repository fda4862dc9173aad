use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;

use super::registry::{LatencyBucket, MetricsRegistry};
use super::request_logger::{RequestLogger, RequestSummary};
use crate::error::AppError;

/// Largest request body the instrumentation layer will buffer
pub const MAX_LOGGED_BODY: usize = 1024 * 1024;

#[derive(Clone)]
pub struct Instrumentation {
    pub metrics: Arc<MetricsRegistry>,
    pub logger: RequestLogger,
}

/// Count the request, time it, and log the exchange once the response is final.
pub async fn instrument(
    State(inst): State<Instrumentation>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    inst.metrics.record_request(req.method());

    let (parts, body) = req.into_parts();
    let request_body = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected unreadable request body");
            return AppError::BadRequest("request body too large".to_string()).into_response();
        }
    };
    let summary = RequestSummary::from_parts(&parts, &request_body);

    let response = next
        .run(Request::from_parts(parts, Body::from(request_body)))
        .await;

    let (parts, body) = response.into_parts();
    let response_body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to buffer response body");
            return AppError::InternalError(e.to_string()).into_response();
        }
    };

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    inst.metrics.record_latency(LatencyBucket::Endpoint, elapsed_ms);
    inst.logger
        .log_http_exchange(&summary, parts.status, &response_body);

    tracing::debug!(
        method = %summary.method,
        path = %summary.path,
        status = parts.status.as_u16(),
        elapsed_ms = elapsed_ms,
        "Request completed"
    );

    Response::from_parts(parts, Body::from(response_body))
}
