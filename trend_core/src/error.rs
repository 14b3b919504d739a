use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Failures raised by the market-data collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MarketDataError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Exchange error: {0}")]
    Exchange(String),

    #[error("Failed to decode market data: {0}")]
    Decode(String),
}

fn rate_limit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)too many requests|limit").expect("rate limit pattern is valid")
    })
}

impl MarketDataError {
    /// Classifies an exchange-side error message. Messages that mention
    /// "too many requests" or a limit are treated as rate limiting.
    pub fn exchange(message: impl Into<String>) -> Self {
        let message = message.into();
        if rate_limit_pattern().is_match(&message) {
            MarketDataError::RateLimited(message)
        } else {
            MarketDataError::Exchange(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MarketDataError::RateLimited(_))
    }

    /// Network and rate-limit failures are worth retrying on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MarketDataError::Network(_) | MarketDataError::RateLimited(_)
        )
    }
}

/// Failures raised by the notification sink. Always logged, never fatal.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Notification target is not configured")]
    NotConfigured,

    #[error("Report has no entries")]
    EmptyReport,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid parameters for timeframe {timeframe}: {message}")]
    InvalidParameters { timeframe: String, message: String },
}
