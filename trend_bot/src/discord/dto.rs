use serde::Serialize;

use trend_core::report::{format_value, AnalysisResult};
use trend_core::ta::Trend;

pub const COLOR_BULLISH: u32 = 65280;
pub const COLOR_BEARISH: u32 = 16711680;
pub const COLOR_SIDEWAYS: u32 = 16776960;

/// Discord rejects messages with more than this many embeds.
pub const MAX_EMBEDS_PER_MESSAGE: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

fn field(name: &str, value: String, inline: bool) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value,
        inline,
    }
}

fn code(value: Option<f64>) -> String {
    match value {
        Some(_) => format!("`{}`", format_value(value)),
        None => format_value(None),
    }
}

pub fn trend_color(trend: Trend) -> u32 {
    match trend {
        Trend::Bullish => COLOR_BULLISH,
        Trend::Bearish => COLOR_BEARISH,
        Trend::Sideways => COLOR_SIDEWAYS,
    }
}

impl Embed {
    pub fn from_analysis(result: &AnalysisResult, description: &str) -> Self {
        let snapshot = &result.snapshot;
        Self {
            title: format!(
                "📈 {} - {} Analysis",
                result.symbol,
                result.timeframe.display_label()
            ),
            description: description.to_string(),
            color: trend_color(result.trend),
            fields: vec![
                field("Last Price", format!("`{:.2}`", result.close_price), true),
                field("Candle", result.candle_kind.to_string(), true),
                field(
                    "Price Action",
                    result
                        .price_action_note
                        .clone()
                        .unwrap_or_else(|| "-".to_string()),
                    false,
                ),
                field("Trend (Ichimoku)", format!("**{}**", result.trend), true),
                field(
                    &format!("EMA {}/{} Crossover", result.ema_periods.0, result.ema_periods.1),
                    format!("**{}**", result.ema_cross),
                    true,
                ),
                field("RSI", code(snapshot.rsi), true),
                field(
                    "Stochastic",
                    format!(
                        "K: {}, D: {} ({})",
                        code(snapshot.stoch_k),
                        code(snapshot.stoch_d),
                        result.stoch_cross
                    ),
                    true,
                ),
                field(
                    "Ichimoku Cloud",
                    format!(
                        "Senkou A: {}\nSenkou B: {}",
                        code(result.senkou_a()),
                        code(result.senkou_b())
                    ),
                    false,
                ),
            ],
            footer: EmbedFooter {
                text: "Data from Binance".to_string(),
            },
        }
    }
}
