use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::analyzer::SkipReason;
use crate::candles::Timeframe;
use crate::config::TimeframeConfig;
use crate::error::MarketDataError;

/// Open time of the last candle analysed per timeframe. `None` until the first
/// successful analysis. Only moves forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulingState {
    last_processed: HashMap<Timeframe, Option<DateTime<Utc>>>,
}

impl SchedulingState {
    pub fn new(timeframes: &[TimeframeConfig]) -> Self {
        Self {
            last_processed: timeframes
                .iter()
                .map(|tf| (tf.timeframe.clone(), None))
                .collect(),
        }
    }

    pub fn last_processed(&self, timeframe: &Timeframe) -> Option<DateTime<Utc>> {
        self.last_processed.get(timeframe).copied().flatten()
    }

    /// A probed candle is new when nothing has been processed yet or it opened
    /// strictly after the last processed one.
    pub fn is_new_candle(&self, timeframe: &Timeframe, probed: DateTime<Utc>) -> bool {
        match self.last_processed(timeframe) {
            None => true,
            Some(last) => probed > last,
        }
    }

    /// Returns false and leaves the state untouched when `as_of` is not newer.
    pub fn record(&mut self, timeframe: &Timeframe, as_of: DateTime<Utc>) -> bool {
        if !self.is_new_candle(timeframe, as_of) {
            return false;
        }
        self.last_processed.insert(timeframe.clone(), Some(as_of));
        true
    }

    pub fn len(&self) -> usize {
        self.last_processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_processed.is_empty()
    }
}

/// What one startup pass or steady-state cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    /// Timeframes analysed successfully, in declared order.
    pub analyzed: Vec<Timeframe>,
    /// Timeframes whose latest candle was already processed.
    pub unchanged: Vec<Timeframe>,
    pub skipped: Vec<(Timeframe, SkipReason)>,
    pub probe_failures: Vec<(Timeframe, MarketDataError)>,
    /// Entries in the report handed to the sink, 0 when nothing was sent.
    pub report_entries: usize,
    pub delivered: bool,
}

impl CycleOutcome {
    pub fn report_sent(&self) -> bool {
        self.report_entries > 0
    }
}
