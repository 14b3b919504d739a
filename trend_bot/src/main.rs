mod binance;
mod config;
mod discord;
mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;

use trend_core::analyzer::TimeframeAnalyzer;
use trend_core::config::load_timeframes;
use trend_core::scheduler::CandleCloseScheduler;

use crate::binance::BinanceClient;
use crate::config::BotConfig;
use crate::discord::DiscordWebhook;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = BotConfig::from_env().context("Failed to load configuration")?;
    logging::init(config.log_file.as_deref())?;
    let timeframes = load_timeframes(&config.timeframes_path).with_context(|| {
        format!(
            "Failed to load timeframes from {:?}",
            config.timeframes_path
        )
    })?;

    let labels: Vec<String> = timeframes
        .iter()
        .map(|tf| tf.timeframe.to_string())
        .collect();
    log::info!(
        "Starting trend_bot for {} on {}. Checking for closed candles every {} minutes.",
        config.symbol_label,
        labels.join(", "),
        config.cadence.interval.as_secs() / 60
    );

    let market = Arc::new(BinanceClient::new(config.binance_url.clone())?);
    let sink = Arc::new(DiscordWebhook::new(config.discord_webhook_url.clone())?);
    if !sink.is_configured() {
        log::warn!("DISCORD_WEBHOOK_URL is not set; reports will only be logged");
    }

    if config.announce_startup {
        let message = format!(
            "🤖 Trend bot online for {} ({})",
            config.symbol_label,
            labels.join(", ")
        );
        if let Err(e) = sink.send_text(&message).await {
            log::error!("Failed to send startup notice: {}", e);
        }
    }

    let analyzer = TimeframeAnalyzer::new(market, config.symbol.clone(), config.cross_fallback)
        .with_symbol_label(config.symbol_label.clone());
    let mut scheduler = CandleCloseScheduler::new(analyzer, sink, timeframes, config.cadence);

    tokio::select! {
        _ = scheduler.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            log::info!("Shutdown signal received, stopping trend_bot");
        }
    }

    Ok(())
}
