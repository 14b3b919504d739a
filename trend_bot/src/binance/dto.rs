use serde::Deserialize;
use serde_json::Value;

use trend_core::candles::RawCandle;
use trend_core::error::MarketDataError;

/// Error body Binance returns with non-success statuses.
#[derive(Debug, Deserialize)]
pub struct BinanceErrorBody {
    pub code: i64,
    pub msg: String,
}

/// One `/api/v3/klines` row:
/// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct KlineRow(pub Vec<Value>);

impl KlineRow {
    pub fn into_raw(self) -> Result<RawCandle, MarketDataError> {
        let row = self.0;
        if row.len() < 6 {
            return Err(MarketDataError::Decode(format!(
                "kline row has {} fields, expected at least 6",
                row.len()
            )));
        }

        let open_time_ms = row[0]
            .as_i64()
            .ok_or_else(|| MarketDataError::Decode(format!("invalid open time {}", row[0])))?;

        Ok(RawCandle {
            open_time_ms,
            open: decimal_field(&row[1], "open")?,
            high: decimal_field(&row[2], "high")?,
            low: decimal_field(&row[3], "low")?,
            close: decimal_field(&row[4], "close")?,
            volume: decimal_field(&row[5], "volume")?,
        })
    }
}

// Binance sends prices as strings to keep precision.
fn decimal_field(value: &Value, name: &str) -> Result<f64, MarketDataError> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| MarketDataError::Decode(format!("invalid {} value {}", name, value)))
}
