use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::Order;
use crate::observability::{
    Accumulator, Counter, LatencyBucket, MetricsRegistry, RequestLogger,
};

/// Factory verdict on a fulfilled order
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fulfillment {
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub report_url: Option<String>,
}

/// Client for the external pizza factory that bakes accepted orders
pub struct FactoryClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    metrics: Arc<MetricsRegistry>,
    logger: RequestLogger,
}

impl FactoryClient {
    pub fn new(
        client: reqwest::Client,
        url: &str,
        api_key: &str,
        metrics: Arc<MetricsRegistry>,
        logger: RequestLogger,
    ) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            metrics,
            logger,
        }
    }

    /// Forward `order` for fulfillment.
    ///
    /// Success counts every item as a pizza sold and adds the item prices to
    /// revenue; any failure counts one creation failure.
    pub async fn create_order(&self, diner: &AuthUser, order: &Order) -> Result<Fulfillment, AppError> {
        let endpoint = format!("{}/api/order", self.url);
        let body = json!({
            "diner": { "id": diner.id, "name": diner.name, "email": diner.email },
            "order": order,
        });
        self.logger.log_api_call(&endpoint, &body);

        let started = Instant::now();
        let result = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        let outcome = match result {
            Ok(response) => {
                let ok = response.status().is_success();
                let reply = response.json::<Fulfillment>().await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Unreadable factory response");
                    Fulfillment::default()
                });
                (ok, reply)
            }
            Err(e) => {
                tracing::error!(error = %e, url = %endpoint, "Factory request failed");
                (false, Fulfillment::default())
            }
        };
        self.metrics.record_latency(
            LatencyBucket::Fulfillment,
            started.elapsed().as_secs_f64() * 1000.0,
        );

        match outcome {
            (true, reply) => {
                self.metrics
                    .increment_by(Counter::PizzasSold, order.items.len() as u64);
                self.metrics.add(Accumulator::Revenue, order.total_price());
                Ok(reply)
            }
            (false, reply) => {
                self.metrics.increment(Counter::CreationFailures);
                Err(AppError::FactoryError {
                    report_url: reply.report_url,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderItem, UserRole};
    use crate::observability::host::HostStats;

    fn diner() -> AuthUser {
        AuthUser {
            id: 3,
            name: "pizza diner".to_string(),
            email: "d@jwt.com".to_string(),
            roles: vec![UserRole::new(crate::models::Role::Diner)],
        }
    }

    fn order() -> Order {
        Order {
            id: 1,
            franchise_id: 1,
            store_id: 1,
            date: chrono::Utc::now(),
            items: vec![OrderItem {
                menu_id: 1,
                description: "Veggie".to_string(),
                price: 0.05,
            }],
        }
    }

    #[tokio::test]
    async fn test_unreachable_factory_counts_failure() {
        let metrics = Arc::new(MetricsRegistry::with_host_sampler(HostStats::default));
        let factory = FactoryClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/",
            "key",
            metrics.clone(),
            RequestLogger::disabled("test"),
        );

        let result = factory.create_order(&diner(), &order()).await;
        assert!(matches!(result, Err(AppError::FactoryError { report_url: None })));
        assert_eq!(metrics.counter(Counter::CreationFailures), 1);
        assert_eq!(metrics.counter(Counter::PizzasSold), 0);
        assert!(metrics.snapshot().latency(LatencyBucket::Fulfillment) >= 0.0);
    }
}
