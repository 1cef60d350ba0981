//! HTTP order-book adapter.
//!
//! Covers the three book operations the system needs: tick history for
//! cap checks, limit-order placement, and order-status polling. Auth
//! headers are attached by the caller-provided signer, keeping this
//! client usable unauthenticated for read-only paths.

use crate::error::{SourceError, SourceResult};
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::traits::{LimitOrder, OrderBook, OrderStatusReport};
use async_trait::async_trait;
use martin_core::PriceTick;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Signs outgoing order requests with venue auth headers.
///
/// The live executor provides an HMAC implementation; read-only
/// deployments use `NoopSigner`.
pub trait RequestSigner: Send + Sync {
    /// Produce `(header_name, header_value)` pairs for a request body.
    fn headers(&self, method: &str, path: &str, body: &str) -> Vec<(String, String)>;
}

/// Signer for unauthenticated (read-only) deployments.
pub struct NoopSigner;

impl RequestSigner for NoopSigner {
    fn headers(&self, _method: &str, _path: &str, _body: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[derive(Debug, Deserialize)]
struct RawTick {
    #[serde(rename = "t")]
    ts: i64,
    #[serde(rename = "p")]
    price: String,
}

#[derive(Debug, Serialize)]
struct PlaceOrderRequest<'a> {
    #[serde(rename = "tokenId")]
    token_id: &'a str,
    price: &'a Decimal,
    size: &'a Decimal,
    side: &'a str,
    #[serde(rename = "clientId")]
    client_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    #[serde(rename = "orderId")]
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct RawOrderStatus {
    #[serde(rename = "orderId")]
    order_id: String,
    status: String,
    #[serde(rename = "fillPrice", default)]
    fill_price: Option<String>,
}

/// HTTP order-book client.
pub struct HttpOrderBook {
    client: Client,
    base_url: String,
    signer: Box<dyn RequestSigner>,
    retry: RetryPolicy,
}

impl HttpOrderBook {
    pub fn new(base_url: impl Into<String>, signer: Box<dyn RequestSigner>) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| SourceError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            signer,
            retry: RetryPolicy::default(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> SourceResult<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl OrderBook for HttpOrderBook {
    async fn price_ticks(
        &self,
        token_id: &str,
        from: i64,
        to: i64,
    ) -> SourceResult<Vec<PriceTick>> {
        let url = format!(
            "{}/prices-history?tokenId={}&from={}&to={}",
            self.base_url, token_id, from, to
        );
        let raw: Vec<RawTick> =
            fetch_with_retry("book_ticks", self.retry, || self.get_json(&url)).await?;

        let mut ticks = Vec::with_capacity(raw.len());
        for t in raw {
            let price = t
                .price
                .parse::<Decimal>()
                .map_err(|e| SourceError::Parse(format!("tick price {:?}: {e}", t.price)))?;
            ticks.push(PriceTick::new(t.ts, price));
        }
        // Stable sort keeps insertion order for duplicate timestamps.
        ticks.sort_by_key(|t| t.ts);

        debug!(token_id, count = ticks.len(), "Fetched price ticks");
        Ok(ticks)
    }

    async fn place_limit(&self, order: &LimitOrder) -> SourceResult<String> {
        let path = "/order";
        let request = PlaceOrderRequest {
            token_id: &order.token_id,
            price: &order.price,
            size: &order.size,
            side: "BUY",
            client_id: &order.client_id,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| SourceError::Parse(format!("Failed to encode order: {e}")))?;

        let mut req = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("content-type", "application/json")
            .body(body.clone());
        for (name, value) in self.signer.headers("POST", path, &body) {
            req = req.header(name, value);
        }

        let response = req
            .send()
            .await
            .map_err(|e| SourceError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 422 {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::OrderRejected(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let placed: PlaceOrderResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse order response: {e}")))?;

        info!(
            token_id = %order.token_id,
            client_id = %order.client_id,
            order_id = %placed.order_id,
            "Limit order placed"
        );
        Ok(placed.order_id)
    }

    async fn order_status(&self, order_id: &str) -> SourceResult<OrderStatusReport> {
        let url = format!("{}/order/{}", self.base_url, order_id);
        let raw: RawOrderStatus =
            fetch_with_retry("order_status", self.retry, || self.get_json(&url)).await?;

        let fill_price = match raw.fill_price {
            None => None,
            Some(p) => Some(
                p.parse::<Decimal>()
                    .map_err(|e| SourceError::Parse(format!("fill price {p:?}: {e}")))?,
            ),
        };

        Ok(OrderStatusReport {
            order_id: raw.order_id,
            status: raw.status,
            fill_price,
        })
    }
}
