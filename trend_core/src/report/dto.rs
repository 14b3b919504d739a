use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::candles::Timeframe;
use crate::ta::{CandleKind, EmaCross, IndicatorSnapshot, StochCross, Trend};

/// Outcome of analysing one timeframe on its latest candle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub timeframe: Timeframe,
    pub symbol: String,
    pub close_price: f64,
    pub candle_kind: CandleKind,
    pub price_action_note: Option<String>,
    pub trend: Trend,
    pub ema_cross: EmaCross,
    pub stoch_cross: StochCross,
    pub ema_periods: (usize, usize),
    pub snapshot: IndicatorSnapshot,
    /// Open time of the candle the analysis was computed on.
    pub as_of: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn senkou_a(&self) -> Option<f64> {
        self.snapshot.senkou_a
    }

    pub fn senkou_b(&self) -> Option<f64> {
        self.snapshot.senkou_b
    }
}

/// One outbound notification: every timeframe that closed in a cycle, in
/// declared order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<AnalysisResult>,
}

impl Report {
    pub fn new(symbol: impl Into<String>, entries: Vec<AnalysisResult>) -> Self {
        Self {
            symbol: symbol.into(),
            generated_at: Utc::now(),
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
