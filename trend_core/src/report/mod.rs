pub mod dto;

pub use dto::{AnalysisResult, Report};

use async_trait::async_trait;
use std::fmt;

use crate::error::DeliveryError;

pub const UNAVAILABLE: &str = "unavailable";

/// Destination for finished reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn send(&self, report: &Report) -> Result<(), DeliveryError>;
}

/// Two-decimal rendering of an indicator value, or the unavailable marker.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => UNAVAILABLE.to_string(),
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ema_short, ema_long) = self.ema_periods;
        writeln!(f, "=== [{}] {} ===", self.timeframe.display_label(), self.symbol)?;
        writeln!(f, "Candle: {}", self.as_of.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(
            f,
            "Price: {:.2} ({}, {})",
            self.close_price,
            self.candle_kind,
            self.price_action_note.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "Trend (Ichimoku): {}", self.trend)?;
        writeln!(f, "EMA {}/{}: {}", ema_short, ema_long, self.ema_cross)?;
        writeln!(f, "RSI: {}", format_value(self.snapshot.rsi))?;
        writeln!(
            f,
            "Stochastic K: {}, D: {} ({})",
            format_value(self.snapshot.stoch_k),
            format_value(self.snapshot.stoch_d),
            self.stoch_cross
        )?;
        write!(
            f,
            "Senkou A: {}, Senkou B: {}",
            format_value(self.senkou_a()),
            format_value(self.senkou_b())
        )
    }
}
