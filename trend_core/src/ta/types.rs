use serde::Serialize;

/// Indicator values for one candle. `None` means not enough history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub rsi: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub senkou_a: Option<f64>,
    pub senkou_b: Option<f64>,
}

/// Per-candle indicator columns, index-aligned with the candle series.
/// The Senkou columns are already shifted forward, so `senkou_a[i]` is the
/// cloud boundary that applies to candle `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSeries {
    pub ema_short: Vec<Option<f64>>,
    pub ema_long: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub stoch_k: Vec<Option<f64>>,
    pub stoch_d: Vec<Option<f64>>,
    pub senkou_a: Vec<Option<f64>>,
    pub senkou_b: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.ema_short.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_short.is_empty()
    }

    pub fn snapshot_at(&self, index: usize) -> IndicatorSnapshot {
        let at = |column: &Vec<Option<f64>>| column.get(index).copied().flatten();
        IndicatorSnapshot {
            ema_short: at(&self.ema_short),
            ema_long: at(&self.ema_long),
            rsi: at(&self.rsi),
            stoch_k: at(&self.stoch_k),
            stoch_d: at(&self.stoch_d),
            senkou_a: at(&self.senkou_a),
            senkou_b: at(&self.senkou_b),
        }
    }

    pub fn latest(&self) -> IndicatorSnapshot {
        match self.len() {
            0 => IndicatorSnapshot::default(),
            n => self.snapshot_at(n - 1),
        }
    }
}

/// Whether the series was long enough for every indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warmup {
    Complete,
    Partial { available: usize, required: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorOutput {
    pub snapshot: IndicatorSnapshot,
    pub warmup: Warmup,
}

impl IndicatorOutput {
    pub fn is_complete(&self) -> bool {
        self.warmup == Warmup::Complete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandleKind {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmaCross {
    GoldenCross,
    DeathCross,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StochCross {
    BullishCross,
    BearishCross,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub candle_kind: CandleKind,
    pub price_action_note: Option<String>,
    pub trend: Trend,
    pub ema_cross: EmaCross,
    pub stoch_cross: StochCross,
}

impl std::fmt::Display for CandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandleKind::Bullish => write!(f, "Bullish Candle 🟢"),
            CandleKind::Bearish => write!(f, "Bearish Candle 🔴"),
            CandleKind::Neutral => write!(f, "Doji/Neutral Candle ⚪"),
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Bullish => write!(f, "BULLISH"),
            Trend::Bearish => write!(f, "BEARISH"),
            Trend::Sideways => write!(f, "SIDEWAYS"),
        }
    }
}

impl std::fmt::Display for EmaCross {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmaCross::GoldenCross => write!(f, "Golden Cross (Bullish)"),
            EmaCross::DeathCross => write!(f, "Death Cross (Bearish)"),
            EmaCross::Unavailable => write!(f, "Unavailable"),
        }
    }
}

impl std::fmt::Display for StochCross {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StochCross::BullishCross => write!(f, "Bullish Cross"),
            StochCross::BearishCross => write!(f, "Bearish Cross"),
            StochCross::Unavailable => write!(f, "Unavailable"),
        }
    }
}
