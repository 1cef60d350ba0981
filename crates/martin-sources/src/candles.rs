//! HTTP candle source adapter.

use crate::error::{SourceError, SourceResult};
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::traits::CandleSource;
use async_trait::async_trait;
use martin_core::{Asset, Candle, CandleInterval};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw candle row: `[ts, open, high, low, close, volume]`.
///
/// Prices arrive as strings to avoid float drift at the wire boundary.
#[derive(Debug, Deserialize)]
struct RawCandle(i64, String, String, String, String, String);

impl RawCandle {
    fn into_candle(self) -> SourceResult<Candle> {
        let parse = |field: &str, value: &str| -> SourceResult<Decimal> {
            value
                .parse::<Decimal>()
                .map_err(|e| SourceError::Parse(format!("candle {field} {value:?}: {e}")))
        };
        Ok(Candle {
            ts: self.0,
            open: parse("open", &self.1)?,
            high: parse("high", &self.2)?,
            low: parse("low", &self.3)?,
            close: parse("close", &self.4)?,
            volume: parse("volume", &self.5)?,
        })
    }
}

/// HTTP candle source client.
pub struct HttpCandleSource {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpCandleSource {
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
}

#[async_trait]
impl CandleSource for HttpCandleSource {
    async fn candles(
        &self,
        asset: &Asset,
        interval: CandleInterval,
        from: i64,
        to: i64,
    ) -> SourceResult<Vec<Candle>> {
        let url = format!(
            "{}/candles?asset={}&interval={}&from={}&to={}",
            self.base_url, asset, interval, from, to
        );

        let raw = fetch_with_retry("candles", self.retry, || async {
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
                .json::<Vec<RawCandle>>()
                .await
                .map_err(|e| SourceError::Parse(format!("Failed to parse candles: {e}")))
        })
        .await?;

        let mut candles = raw
            .into_iter()
            .map(RawCandle::into_candle)
            .collect::<SourceResult<Vec<_>>>()?;
        candles.sort_by_key(|c| c.ts);

        debug!(
            asset = %asset,
            interval = %interval,
            count = candles.len(),
            "Fetched candles"
        );
        Ok(candles)
    }
}
