use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::candles::Timeframe;

/// Per-timeframe indicator settings. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParameters {
    pub lookback_limit: usize,
    pub ema_short: usize,
    pub ema_long: usize,
    pub rsi_period: usize,
    pub stoch_k: usize,
    pub stoch_d: usize,
    /// Smoothing window applied to %K; 1 keeps the raw fast stochastic.
    #[serde(default = "default_stoch_smooth")]
    pub stoch_smooth: usize,
    pub ichimoku_fast: usize,
    pub ichimoku_medium: usize,
    pub ichimoku_slow: usize,
}

fn default_stoch_smooth() -> usize {
    3
}

impl IndicatorParameters {
    /// Candles needed before every indicator can produce a value.
    pub fn full_history(&self) -> usize {
        self.ema_long
            .max(self.rsi_period + 1)
            .max(self.stoch_k)
            .max(self.ichimoku_slow + self.ichimoku_medium)
    }

    /// Candles needed before at least one indicator can produce a value.
    pub fn minimum_history(&self) -> usize {
        self.ema_short
            .min(self.ema_long)
            .min(self.rsi_period + 1)
            .min(self.stoch_k + self.stoch_smooth.max(1) - 1)
            .min(self.ichimoku_slow + self.ichimoku_medium)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeConfig {
    pub timeframe: Timeframe,
    pub params: IndicatorParameters,
}

/// How a cross state is reported when one of its inputs is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossFallback {
    /// Undefined inputs read as a bearish cross.
    #[default]
    Bearish,
    /// Undefined inputs read as unavailable.
    Neutral,
}

/// Wall-clock cadence and request pacing for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceSettings {
    pub interval: Duration,
    pub buffer: Duration,
    pub request_spacing: Duration,
    pub rate_limit_backoff: Duration,
}

impl Default for CadenceSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            buffer: Duration::from_secs(5),
            request_spacing: Duration::from_millis(1050),
            rate_limit_backoff: Duration::from_secs(5),
        }
    }
}

/// Shape of the timeframes RON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframesFile {
    pub timeframes: Vec<TimeframeConfig>,
}
