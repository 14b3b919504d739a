use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a timeframe produced no analysis this cycle. Never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("no candles returned")]
    NoData,

    #[error("insufficient data: {available} candles, at least {required} needed")]
    InsufficientData { available: usize, required: usize },

    #[error("transient error: {message}")]
    TransientError { message: String, rate_limited: bool },

    #[error("computation failed: {0}")]
    ComputationFailed(String),

    /// The analysed candle is not newer than the last one already reported.
    #[error("stale data: latest candle {as_of} is not after {last_processed}")]
    StaleData {
        as_of: DateTime<Utc>,
        last_processed: DateTime<Utc>,
    },
}

impl SkipReason {
    /// Rate-limited skips require the caller to back off before fetching again.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            SkipReason::TransientError {
                rate_limited: true,
                ..
            }
        )
    }
}
