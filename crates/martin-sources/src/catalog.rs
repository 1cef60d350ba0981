//! HTTP market catalog adapter.
//!
//! Talks to a gamma-style catalog API: hourly up/down markets are listed
//! per asset with their outcome token pair, and resolved markets carry a
//! winning outcome.

use crate::error::{SourceError, SourceResult};
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::traits::{MarketCatalog, SettlementSource};
use async_trait::async_trait;
use martin_core::{Asset, Direction, MarketWindow};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for catalog requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw market entry from the catalog API.
#[derive(Debug, Deserialize)]
struct RawMarket {
    slug: String,
    #[serde(rename = "conditionId")]
    condition_id: String,
    #[serde(rename = "upTokenId")]
    up_token_id: String,
    #[serde(rename = "downTokenId")]
    down_token_id: String,
    #[serde(rename = "startTs")]
    start_ts: i64,
    #[serde(rename = "endTs")]
    end_ts: i64,
    /// "UP", "DOWN", or absent while unresolved.
    #[serde(default)]
    outcome: Option<String>,
}

impl RawMarket {
    fn into_window(self, asset: Asset) -> SourceResult<MarketWindow> {
        let outcome = match self.outcome.as_deref() {
            None | Some("") => None,
            Some(s) => Some(
                s.parse::<Direction>()
                    .map_err(|e| SourceError::Parse(format!("market {}: {e}", self.slug)))?,
            ),
        };
        let window = MarketWindow {
            id: 0,
            asset,
            slug: self.slug,
            condition_id: self.condition_id,
            up_token_id: self.up_token_id,
            down_token_id: self.down_token_id,
            start_ts: self.start_ts,
            end_ts: self.end_ts,
            outcome,
        };
        window
            .validate()
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(window)
    }
}

/// HTTP market catalog client.
pub struct HttpMarketCatalog {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpMarketCatalog {
    pub fn new(base_url: impl Into<String>) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| SourceError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        })
    }

    async fn fetch_markets(&self, url: &str) -> SourceResult<Vec<RawMarket>> {
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
            .json::<Vec<RawMarket>>()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse markets: {e}")))
    }
}

#[async_trait]
impl MarketCatalog for HttpMarketCatalog {
    async fn list_open_windows(
        &self,
        assets: &[Asset],
        now: i64,
    ) -> SourceResult<Vec<MarketWindow>> {
        let mut windows = Vec::new();

        for asset in assets {
            let url = format!(
                "{}/markets/hourly?asset={}&active=true&now={}",
                self.base_url, asset, now
            );
            let raw = fetch_with_retry("catalog", self.retry, || self.fetch_markets(&url)).await?;

            debug!(asset = %asset, count = raw.len(), "Fetched open windows");
            for market in raw {
                windows.push(market.into_window(asset.clone())?);
            }
        }

        info!(count = windows.len(), "Catalog listed open windows");
        Ok(windows)
    }
}

#[async_trait]
impl SettlementSource for HttpMarketCatalog {
    async fn resolved_outcome(&self, window: &MarketWindow) -> SourceResult<Option<Direction>> {
        let url = format!("{}/markets/slug/{}", self.base_url, window.slug);
        let raw = fetch_with_retry("settlement", self.retry, || async {
            let response = self
                .client
                .get(&url)
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
                .json::<RawMarket>()
                .await
                .map_err(|e| SourceError::Parse(format!("Failed to parse market: {e}")))
        })
        .await?;

        match raw.outcome.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => s
                .parse::<Direction>()
                .map(Some)
                .map_err(|e| SourceError::Parse(format!("market {}: {e}", window.slug))),
        }
    }
}
