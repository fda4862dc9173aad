use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder backing `GET /metrics`
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

fn init_metric_descriptions() {
    for verb in ["post", "get", "put", "delete"] {
        describe_counter!(
            format!("pizza_{}_requests_total", verb),
            format!("Total number of {} requests", verb.to_uppercase())
        );
    }
    describe_counter!(
        "pizza_success_auth_attempts_total",
        "Successful registrations and logins"
    );
    describe_counter!(
        "pizza_failed_auth_attempts_total",
        "Rejected login attempts"
    );
    describe_counter!("pizza_pizzas_sold_total", "Pizzas accepted by the factory");
    describe_counter!(
        "pizza_creation_failures_total",
        "Orders the factory failed to fulfill"
    );
    describe_gauge!("pizza_revenue_total", "Revenue from fulfilled orders");
    describe_gauge!("pizza_active_users", "Users currently logged in");
    describe_histogram!(
        "pizza_endpoint_latency_ms",
        "Time to serve a request in milliseconds"
    );
    describe_histogram!(
        "pizza_factory_latency_ms",
        "Factory round trip in milliseconds"
    );
    describe_gauge!("pizza_service_info", "Service version information");

    gauge!("pizza_service_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}
