use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use zenbot_core::config::{OrdersConfig, OrdersMode};
use zenbot_core::domain::{Intent, OrderContext, ToolResult};

/// Wire shape shared by both order endpoints. Transport failures are
/// folded into `status = "error"` rather than raised, so the pipeline
/// treats real and simulated backends identically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub order_id: String,
    pub message: String,
}

impl ApiResponse {
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn track(&self, order_id: &str) -> ApiResponse;
    async fn cancel(&self, order_id: &str) -> ApiResponse;
}

const TRACKING_STATUSES: [&str; 4] = ["pending", "shipped", "in_transit", "delivered"];

/// Simulated backend: randomized but well-formed responses, failing at
/// the configured rate.
pub struct SimulatedOrderApi {
    failure_rate: f64,
}

impl SimulatedOrderApi {
    pub fn new(failure_rate: f64) -> Self {
        Self { failure_rate: failure_rate.clamp(0.0, 1.0) }
    }
}

#[async_trait]
impl OrderApi for SimulatedOrderApi {
    async fn track(&self, order_id: &str) -> ApiResponse {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.failure_rate) {
            return ApiResponse {
                status: "error".to_owned(),
                order_id: order_id.to_owned(),
                message: "Simulated tracking failure.".to_owned(),
            };
        }

        let status = *TRACKING_STATUSES.choose(&mut rng).unwrap_or(&"pending");
        ApiResponse {
            status: status.to_owned(),
            order_id: order_id.to_owned(),
            message: format!("Simulated tracking: {status}."),
        }
    }

    async fn cancel(&self, order_id: &str) -> ApiResponse {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.failure_rate) {
            return ApiResponse {
                status: "error".to_owned(),
                order_id: order_id.to_owned(),
                message: "Simulated cancellation failure.".to_owned(),
            };
        }

        ApiResponse {
            status: "ok".to_owned(),
            order_id: order_id.to_owned(),
            message: "Simulated cancellation successful.".to_owned(),
        }
    }
}

/// Real HTTP backend. No retries: a timed-out or failed call is an
/// error response, full stop.
pub struct HttpOrderApi {
    client: reqwest::Client,
    tracking_url: String,
    cancellation_url: String,
}

impl HttpOrderApi {
    pub fn new(
        tracking_url: impl Into<String>,
        cancellation_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, tracking_url: tracking_url.into(), cancellation_url: cancellation_url.into() }
    }

    fn transport_error(order_id: &str, error: reqwest::Error) -> ApiResponse {
        ApiResponse {
            status: "error".to_owned(),
            order_id: order_id.to_owned(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn track(&self, order_id: &str) -> ApiResponse {
        let result = self
            .client
            .get(&self.tracking_url)
            .query(&[("order_id", order_id)])
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(response) => response
                .json::<ApiResponse>()
                .await
                .unwrap_or_else(|error| Self::transport_error(order_id, error)),
            Err(error) => Self::transport_error(order_id, error),
        }
    }

    async fn cancel(&self, order_id: &str) -> ApiResponse {
        let result = self
            .client
            .post(&self.cancellation_url)
            .json(&json!({ "order_id": order_id }))
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(response) => response
                .json::<ApiResponse>()
                .await
                .unwrap_or_else(|error| Self::transport_error(order_id, error)),
            Err(error) => Self::transport_error(order_id, error),
        }
    }
}

/// Performs the backend action for a resolved intent. `none` never
/// touches the network.
pub struct ToolInvoker {
    api: Arc<dyn OrderApi>,
}

impl ToolInvoker {
    pub fn new(api: Arc<dyn OrderApi>) -> Self {
        Self { api }
    }

    pub fn from_config(config: &OrdersConfig) -> Self {
        let api: Arc<dyn OrderApi> = match config.mode {
            OrdersMode::Simulated => Arc::new(SimulatedOrderApi::new(config.simulated_failure_rate)),
            OrdersMode::Real => Arc::new(HttpOrderApi::new(
                config.tracking_url.clone().unwrap_or_default(),
                config.cancellation_url.clone().unwrap_or_default(),
                config.timeout_secs,
            )),
        };
        Self::new(api)
    }

    pub async fn invoke(&self, intent: Intent, order: &OrderContext) -> ToolResult {
        let response = match intent {
            Intent::None => return ToolResult::skipped(),
            Intent::Track => self.api.track(&order.order_id).await,
            Intent::Cancel => self.api.cancel(&order.order_id).await,
        };

        let is_error = response.is_error();
        let payload = serde_json::to_value(&response).unwrap_or_default();
        if is_error {
            ToolResult::error(payload)
        } else {
            ToolResult::ok(payload)
        }
    }
}
