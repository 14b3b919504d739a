use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::dto::SkipReason;
use crate::candles::{CandleSeries, Timeframe};
use crate::config::{CrossFallback, IndicatorParameters, TimeframeConfig};
use crate::error::MarketDataError;
use crate::market::MarketData;
use crate::report::AnalysisResult;
use crate::ta::{self, Classification, IndicatorOutput, Warmup};

type ComputeFn = fn(&CandleSeries, &IndicatorParameters) -> IndicatorOutput;

/// Fetches, computes and classifies one timeframe at a time.
pub struct TimeframeAnalyzer<M> {
    market: Arc<M>,
    symbol: String,
    symbol_label: String,
    cross_fallback: CrossFallback,
    compute: ComputeFn,
}

impl<M: MarketData> TimeframeAnalyzer<M> {
    pub fn new(
        market: Arc<M>,
        symbol: impl Into<String>,
        cross_fallback: CrossFallback,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            market,
            symbol_label: symbol.clone(),
            symbol,
            cross_fallback,
            compute: ta::compute,
        }
    }

    #[cfg(test)]
    fn with_compute(mut self, compute: ComputeFn) -> Self {
        self.compute = compute;
        self
    }

    /// Human-readable instrument name used in reports, e.g. `BTC/USDT`.
    pub fn with_symbol_label(mut self, label: impl Into<String>) -> Self {
        self.symbol_label = label.into();
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn symbol_label(&self) -> &str {
        &self.symbol_label
    }

    /// Open time of the most recent candle, fetched with a single-candle request.
    pub async fn latest_candle_time(
        &self,
        timeframe: &Timeframe,
    ) -> Result<Option<DateTime<Utc>>, MarketDataError> {
        let rows = self.market.fetch_candles(&self.symbol, timeframe, 1).await?;
        Ok(CandleSeries::from_raw(rows).last().map(|c| c.open_time))
    }

    pub async fn analyze(&self, config: &TimeframeConfig) -> Result<AnalysisResult, SkipReason> {
        let tf = &config.timeframe;
        let params = &config.params;
        log::info!("[{}] Starting analysis for {}", tf, self.symbol);

        let rows = match self
            .market
            .fetch_candles(&self.symbol, tf, params.lookback_limit)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                let reason = SkipReason::TransientError {
                    message: e.to_string(),
                    rate_limited: e.is_rate_limited(),
                };
                match &e {
                    MarketDataError::RateLimited(_) => log::warn!(
                        "[{}] Rate limit hit: {}. Backing off before next fetch.",
                        tf,
                        e
                    ),
                    MarketDataError::Network(_) => {
                        log::error!("[{}] Network error: {}. Retrying next cycle.", tf, e)
                    }
                    _ => log::error!("[{}] {}. Check symbol or API limits.", tf, e),
                }
                return Err(reason);
            }
        };

        let series = CandleSeries::from_raw(rows);
        let Some(last) = series.last().copied() else {
            log::warn!(
                "[{}] No candle data fetched for {}. Skipping analysis.",
                tf,
                self.symbol
            );
            return Err(SkipReason::NoData);
        };

        let minimum = params.minimum_history();
        if series.len() < minimum {
            log::warn!(
                "[{}] Not enough data ({} candles) for any indicator. \
                 Minimum needed: {}. Skipping analysis.",
                tf,
                series.len(),
                minimum
            );
            return Err(SkipReason::InsufficientData {
                available: series.len(),
                required: minimum,
            });
        }

        let fallback = self.cross_fallback;
        let compute = self.compute;
        let computed = panic::catch_unwind(AssertUnwindSafe(|| {
            let output = compute(&series, params);
            let classification = ta::classify(&last, &output.snapshot, fallback);
            (output, classification)
        }));

        let (output, classification): (IndicatorOutput, Classification) = match computed {
            Ok(value) => value,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!(
                    "[{}] Unexpected error computing indicators over {} candles ending {}: {}",
                    tf,
                    series.len(),
                    last.open_time,
                    message
                );
                return Err(SkipReason::ComputationFailed(message));
            }
        };

        if let Warmup::Partial { available, required } = output.warmup {
            log::info!(
                "[{}] Partial indicator history ({} of {} candles); some values are unavailable",
                tf,
                available,
                required
            );
        }

        let result = AnalysisResult {
            timeframe: tf.clone(),
            symbol: self.symbol_label.clone(),
            close_price: last.close,
            candle_kind: classification.candle_kind,
            price_action_note: classification.price_action_note,
            trend: classification.trend,
            ema_cross: classification.ema_cross,
            stoch_cross: classification.stoch_cross,
            ema_periods: (params.ema_short, params.ema_long),
            snapshot: output.snapshot,
            as_of: last.open_time,
        };

        log::info!("\n{}", result);
        Ok(result)
    }
}
