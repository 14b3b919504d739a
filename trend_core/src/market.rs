use async_trait::async_trait;

use crate::candles::{RawCandle, Timeframe};
use crate::error::MarketDataError;

/// Source of candle history for one exchange.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Returns up to `limit` of the most recent candles, oldest first. The last
    /// candle may still be open.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        limit: usize,
    ) -> Result<Vec<RawCandle>, MarketDataError>;
}
