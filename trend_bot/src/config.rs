use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use trend_core::config::{CadenceSettings, CrossFallback};
use trend_core::error::ConfigError;

pub const DEFAULT_BINANCE_URL: &str = "https://api.binance.com";
pub const DEFAULT_TIMEFRAMES_CONFIG: &str = "config/timeframes.ron";
pub const DEFAULT_LOG_FILE: &str = "trend_bot.log";

/// Process-wide settings read from the environment once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub symbol: String,
    pub symbol_label: String,
    pub binance_url: String,
    pub discord_webhook_url: Option<String>,
    pub cadence: CadenceSettings,
    pub cross_fallback: CrossFallback,
    pub timeframes_path: PathBuf,
    pub announce_startup: bool,
    /// Append-only log file next to stderr output. `LOG_FILE=off` disables it.
    pub log_file: Option<PathBuf>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let symbol = get("SYMBOL").unwrap_or_else(|| "BTCUSDT".to_string());
        let symbol_label = get("SYMBOL_LABEL").unwrap_or_else(|| "BTC/USDT".to_string());

        let defaults = CadenceSettings::default();
        let cadence_minutes: u64 = parse_or(&get, "CADENCE_MINUTES", 15)?;
        if cadence_minutes == 0 {
            return Err(invalid("CADENCE_MINUTES", "must be at least 1"));
        }
        let cadence = CadenceSettings {
            interval: Duration::from_secs(cadence_minutes * 60),
            buffer: Duration::from_secs(parse_or(
                &get,
                "CADENCE_BUFFER_SECS",
                defaults.buffer.as_secs(),
            )?),
            request_spacing: Duration::from_millis(parse_or(
                &get,
                "REQUEST_SPACING_MS",
                defaults.request_spacing.as_millis() as u64,
            )?),
            rate_limit_backoff: Duration::from_secs(parse_or(
                &get,
                "RATE_LIMIT_BACKOFF_SECS",
                defaults.rate_limit_backoff.as_secs(),
            )?),
        };

        let cross_fallback = match get("CROSS_FALLBACK").map(|v| v.to_lowercase()).as_deref() {
            None | Some("bearish") => CrossFallback::Bearish,
            Some("neutral") => CrossFallback::Neutral,
            Some(other) => {
                return Err(invalid(
                    "CROSS_FALLBACK",
                    &format!("expected bearish or neutral, got {}", other),
                ));
            }
        };

        let log_file = match get("LOG_FILE") {
            Some(v) if v.eq_ignore_ascii_case("off") => None,
            Some(v) => Some(PathBuf::from(v)),
            None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        };

        Ok(Self {
            symbol,
            symbol_label,
            binance_url: get("BINANCE_URL")
                .unwrap_or_else(|| DEFAULT_BINANCE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            cadence,
            cross_fallback,
            timeframes_path: PathBuf::from(
                get("TIMEFRAMES_CONFIG")
                    .unwrap_or_else(|| DEFAULT_TIMEFRAMES_CONFIG.to_string()),
            ),
            announce_startup: parse_or(&get, "ANNOUNCE_STARTUP", false)?,
            log_file,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| invalid(key, &format!("{:?}: {}", raw, e))),
        None => Ok(default),
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
