use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle interval label as understood by the exchange, e.g. `1h`, `4h`, `1d`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeframe(String);

impl Timeframe {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-case label used in reports (`4h` -> `4H`).
    pub fn display_label(&self) -> String {
        self.0.to_uppercase()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Timeframe {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Candle row exactly as the market-data collaborator hands it over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandle {
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl TryFrom<RawCandle> for Candle {
    type Error = String;

    fn try_from(raw: RawCandle) -> Result<Self, Self::Error> {
        let open_time = DateTime::from_timestamp_millis(raw.open_time_ms)
            .ok_or_else(|| format!("open time {} is out of range", raw.open_time_ms))?;

        let candle = Candle {
            open_time,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        };

        if !candle.is_finite() {
            return Err(format!("candle at {} has non-finite values", open_time));
        }

        Ok(candle)
    }
}

/// Time-ordered candles for one timeframe. Open times are strictly increasing;
/// the last candle may still be open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Normalizes rows from the exchange: sorts by open time, keeps the last
    /// row seen for a duplicated open time and drops rows that cannot be
    /// represented.
    pub fn from_raw(rows: Vec<RawCandle>) -> Self {
        let mut candles = Vec::with_capacity(rows.len());
        for raw in rows {
            match Candle::try_from(raw) {
                Ok(candle) => candles.push(candle),
                Err(e) => log::warn!("Dropping malformed candle: {}", e),
            }
        }
        Self::new(candles)
    }

    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.open_time);
        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match deduped.last_mut() {
                Some(last) if last.open_time == candle.open_time => *last = candle,
                _ => deduped.push(candle),
            }
        }
        Self { candles: deduped }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }
}
