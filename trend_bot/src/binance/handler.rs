use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use trend_core::candles::{RawCandle, Timeframe};
use trend_core::error::MarketDataError;
use trend_core::market::MarketData;

use crate::binance::dto::{BinanceErrorBody, KlineRow};

const MAX_KLINES_LIMIT: usize = 1000;

/// Public spot market-data client for Binance.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("trend_bot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Binance HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<RawCandle>, MarketDataError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.clamp(1, MAX_KLINES_LIMIT);
        debug!("🌐 GET {} symbol={} interval={} limit={}", url, symbol, interval, limit);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await;

        let resp = match response {
            Ok(resp) => resp,
            Err(network_error) => {
                if network_error.is_timeout() {
                    error!("⏰ Binance request timed out: {}", url);
                } else if network_error.is_connect() {
                    error!("🔌 Connection to Binance failed: {}", url);
                }
                return Err(MarketDataError::Network(network_error.to_string()));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            warn!("⚠️ Binance responded with {}: {}", status, body);
            return Err(classify_status(status, &body));
        }

        let rows: Vec<KlineRow> = resp
            .json()
            .await
            .map_err(|e| MarketDataError::Decode(e.to_string()))?;

        rows.into_iter().map(KlineRow::into_raw).collect()
    }
}

fn classify_status(status: StatusCode, body: &str) -> MarketDataError {
    // 418 is Binance's IP ban after ignoring 429s
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        return MarketDataError::RateLimited(format!("{}: {}", status, body));
    }

    match serde_json::from_str::<BinanceErrorBody>(body) {
        Ok(err) => MarketDataError::exchange(format!("{} (code {})", err.msg, err.code)),
        Err(_) if status.is_server_error() => {
            MarketDataError::Network(format!("{}: {}", status, body))
        }
        Err(_) => MarketDataError::exchange(format!("{}: {}", status, body)),
    }
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        limit: usize,
    ) -> Result<Vec<RawCandle>, MarketDataError> {
        self.get_klines(symbol, timeframe.as_str(), limit).await
    }
}
