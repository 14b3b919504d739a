pub mod dto;

pub use dto::{CadenceSettings, CrossFallback, IndicatorParameters, TimeframeConfig, TimeframesFile};

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::candles::Timeframe;
use crate::error::ConfigError;

fn params(
    lookback_limit: usize,
    ema_short: usize,
    ema_long: usize,
    stoch_k: usize,
) -> IndicatorParameters {
    IndicatorParameters {
        lookback_limit,
        ema_short,
        ema_long,
        rsi_period: 14,
        stoch_k,
        stoch_d: 3,
        stoch_smooth: 3,
        ichimoku_fast: 9,
        ichimoku_medium: 26,
        ichimoku_slow: 52,
    }
}

/// Built-in timeframes in declared order: 1h, 4h, 1d.
pub fn default_timeframes() -> Vec<TimeframeConfig> {
    vec![
        TimeframeConfig {
            timeframe: Timeframe::from("1h"),
            params: params(150, 10, 20, 5),
        },
        TimeframeConfig {
            timeframe: Timeframe::from("4h"),
            params: params(200, 21, 50, 5),
        },
        TimeframeConfig {
            timeframe: Timeframe::from("1d"),
            params: params(300, 50, 100, 14),
        },
    ]
}

pub fn parse_timeframes(content: &str) -> Result<Vec<TimeframeConfig>, ConfigError> {
    let file: TimeframesFile =
        ron::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_timeframes(&file.timeframes)?;
    Ok(file.timeframes)
}

/// Reads the timeframes RON file, falling back to the built-in set when the
/// file does not exist.
pub fn load_timeframes<P: AsRef<Path>>(path: P) -> Result<Vec<TimeframeConfig>, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!(
            "Timeframes config {:?} not found, using built-in timeframes",
            path
        );
        return Ok(default_timeframes());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let timeframes = parse_timeframes(&content)?;
    log::info!("Loaded {} timeframes from {:?}", timeframes.len(), path);
    Ok(timeframes)
}

pub fn validate_timeframes(timeframes: &[TimeframeConfig]) -> Result<(), ConfigError> {
    if timeframes.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "timeframes".to_string(),
            message: "at least one timeframe is required".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for tf in timeframes {
        if !seen.insert(tf.timeframe.clone()) {
            return Err(ConfigError::InvalidParameters {
                timeframe: tf.timeframe.to_string(),
                message: "timeframe is declared twice".to_string(),
            });
        }
        validate_params(&tf.timeframe, &tf.params)?;
    }

    Ok(())
}

fn validate_params(timeframe: &Timeframe, p: &IndicatorParameters) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidParameters {
        timeframe: timeframe.to_string(),
        message: message.to_string(),
    };

    let periods = [
        p.lookback_limit,
        p.ema_short,
        p.ema_long,
        p.rsi_period,
        p.stoch_k,
        p.stoch_d,
        p.stoch_smooth,
        p.ichimoku_fast,
        p.ichimoku_medium,
        p.ichimoku_slow,
    ];
    if periods.iter().any(|&v| v == 0) {
        return Err(invalid("all periods and the lookback limit must be at least 1"));
    }
    if p.ema_short > p.ema_long {
        return Err(invalid("ema_short must not exceed ema_long"));
    }
    if p.ichimoku_fast > p.ichimoku_medium || p.ichimoku_medium > p.ichimoku_slow {
        return Err(invalid("ichimoku periods must satisfy fast <= medium <= slow"));
    }

    Ok(())
}
