use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::dto::{CycleOutcome, SchedulingState};
use super::pacer::RequestPacer;
use crate::analyzer::{SkipReason, TimeframeAnalyzer};
use crate::config::{CadenceSettings, TimeframeConfig};
use crate::market::MarketData;
use crate::report::{AnalysisResult, Report, ReportSink};

/// Delay until the next wall-clock multiple of `interval` (counted from the
/// Unix epoch), plus `buffer`. Exactly on a boundary waits only the buffer.
pub fn next_wake_delay(now: DateTime<Utc>, interval: Duration, buffer: Duration) -> Duration {
    let period_ms = (interval.as_millis() as i64).max(1);
    let rem = now.timestamp_millis().rem_euclid(period_ms);
    let to_boundary = if rem == 0 { 0 } else { period_ms - rem };
    Duration::from_millis(to_boundary as u64) + buffer
}

/// Polls every configured timeframe for a closed candle and sends one batched
/// report per cycle.
pub struct CandleCloseScheduler<M, N> {
    analyzer: TimeframeAnalyzer<M>,
    sink: Arc<N>,
    timeframes: Vec<TimeframeConfig>,
    cadence: CadenceSettings,
    state: SchedulingState,
    pacer: RequestPacer,
}

impl<M: MarketData, N: ReportSink> CandleCloseScheduler<M, N> {
    pub fn new(
        analyzer: TimeframeAnalyzer<M>,
        sink: Arc<N>,
        timeframes: Vec<TimeframeConfig>,
        cadence: CadenceSettings,
    ) -> Self {
        let state = SchedulingState::new(&timeframes);
        let pacer = RequestPacer::new(cadence.request_spacing, cadence.rate_limit_backoff);
        Self {
            analyzer,
            sink,
            timeframes,
            cadence,
            state,
            pacer,
        }
    }

    /// Replaces the scheduling state, e.g. to resume from a known snapshot.
    pub fn with_state(mut self, state: SchedulingState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &SchedulingState {
        &self.state
    }

    /// Runs the startup pass, then polls forever. Returns only when the future
    /// is dropped.
    pub async fn run(&mut self) {
        self.startup().await;

        loop {
            let now = Utc::now();
            let delay = next_wake_delay(now, self.cadence.interval, self.cadence.buffer);
            let wake_at = now
                + chrono::Duration::from_std(delay)
                    .unwrap_or_else(|_| chrono::Duration::zero());
            log::info!(
                "[sched] sleeping {}s until {}",
                delay.as_secs(),
                wake_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            tokio::time::sleep(delay).await;

            let outcome = self.run_cycle().await;
            log::debug!(
                "[sched] cycle done: analyzed={} unchanged={} skipped={} probe_failures={}",
                outcome.analyzed.len(),
                outcome.unchanged.len(),
                outcome.skipped.len(),
                outcome.probe_failures.len()
            );
        }
    }

    /// Analyzes every timeframe once, seeds the state and sends one report
    /// with whatever succeeded.
    pub async fn startup(&mut self) -> CycleOutcome {
        log::info!(
            "[sched] initial analysis of {} timeframes for {}",
            self.timeframes.len(),
            self.analyzer.symbol()
        );

        let mut outcome = CycleOutcome::default();
        let mut entries = Vec::new();
        let timeframes = self.timeframes.clone();

        for config in &timeframes {
            if let Some(result) = self.analyze_and_record(config, None, &mut outcome).await {
                entries.push(result);
            }
        }

        self.deliver(entries, &mut outcome).await;
        outcome
    }

    /// One wake-up: probe each timeframe and analyze the ones whose candle
    /// closed since the last processed one.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        log::info!("[sched] checking for closed candles");

        let mut outcome = CycleOutcome::default();
        let mut entries = Vec::new();
        let timeframes = self.timeframes.clone();

        for config in &timeframes {
            let tf = &config.timeframe;

            self.pacer.wait().await;
            let probed = self.analyzer.latest_candle_time(tf).await;
            self.pacer
                .mark(probed.as_ref().is_err_and(|e| e.is_rate_limited()));

            let latest = match probed {
                Ok(Some(latest)) => latest,
                Ok(None) => {
                    log::warn!("[{}] No candle returned by the latest-candle probe", tf);
                    outcome.skipped.push((tf.clone(), SkipReason::NoData));
                    continue;
                }
                Err(e) => {
                    if e.is_rate_limited() {
                        log::warn!("[{}] Rate limit hit while probing: {}", tf, e);
                    } else {
                        log::error!("[{}] Failed to probe latest candle: {}", tf, e);
                    }
                    outcome.probe_failures.push((tf.clone(), e));
                    continue;
                }
            };

            if !self.state.is_new_candle(tf, latest) {
                log::info!(
                    "[{}] No new candle. Last processed: {}",
                    tf,
                    self.state
                        .last_processed(tf)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string())
                );
                outcome.unchanged.push(tf.clone());
                continue;
            }

            log::info!("[{}] New candle detected at {}", tf, latest.to_rfc3339());
            if let Some(result) = self
                .analyze_and_record(config, Some(latest), &mut outcome)
                .await
            {
                entries.push(result);
            }
        }

        self.deliver(entries, &mut outcome).await;
        outcome
    }

    /// Analyzes one timeframe and records it. Results that are not newer than
    /// the recorded state are skipped as stale.
    async fn analyze_and_record(
        &mut self,
        config: &TimeframeConfig,
        latest_open: Option<DateTime<Utc>>,
        outcome: &mut CycleOutcome,
    ) -> Option<AnalysisResult> {
        let tf = &config.timeframe;

        self.pacer.wait().await;
        let analysis = self.analyzer.analyze(config).await;
        self.pacer
            .mark(analysis.as_ref().is_err_and(|reason| reason.is_rate_limited()));

        match analysis {
            Ok(result) => {
                if let Some(latest_open) = latest_open {
                    if result.as_of < latest_open {
                        log::warn!(
                            "[{}] Fetched history ends at {} but the latest candle opened at {}",
                            tf,
                            result.as_of.to_rfc3339(),
                            latest_open.to_rfc3339()
                        );
                    }
                }

                if !self.state.record(tf, result.as_of) {
                    let reason = SkipReason::StaleData {
                        as_of: result.as_of,
                        last_processed: self.state.last_processed(tf).unwrap_or(result.as_of),
                    };
                    log::warn!("[{}] {}. Not reporting it again.", tf, reason);
                    outcome.skipped.push((tf.clone(), reason));
                    return None;
                }

                outcome.analyzed.push(tf.clone());
                Some(result)
            }
            Err(reason) => {
                log::debug!("[{}] skipped: {}", tf, reason);
                outcome.skipped.push((tf.clone(), reason));
                None
            }
        }
    }

    async fn deliver(&self, entries: Vec<AnalysisResult>, outcome: &mut CycleOutcome) {
        if entries.is_empty() {
            log::info!("[sched] no timeframes to report this cycle");
            return;
        }

        let report = Report::new(self.analyzer.symbol_label(), entries);
        outcome.report_entries = report.len();

        match self.sink.send(&report).await {
            Ok(()) => {
                log::info!("[sched] report with {} timeframes delivered", report.len());
                outcome.delivered = true;
            }
            Err(e) => {
                log::error!("[sched] failed to deliver report: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candles::{RawCandle, Timeframe};
    use crate::config::{default_timeframes, CrossFallback};
    use crate::error::{DeliveryError, MarketDataError};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;
    use tokio::time::Instant;

    const HOUR_MS: i64 = 3_600_000;
    const START_MS: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct FakeMarket {
        rows: Mutex<HashMap<String, Vec<RawCandle>>>,
        failures: Mutex<HashMap<String, VecDeque<MarketDataError>>>,
        calls: Mutex<Vec<(String, usize, Instant)>>,
        /// Timeframes whose full-history fetch misses the newest candle.
        lagging: Mutex<HashSet<String>>,
    }

    impl FakeMarket {
        fn with_history(count: usize) -> Arc<Self> {
            let market = Self::default();
            for tf in ["1h", "4h", "1d"] {
                market
                    .rows
                    .lock()
                    .unwrap()
                    .insert(tf.to_string(), (0..count).map(row).collect());
            }
            Arc::new(market)
        }

        fn push_candle(&self, timeframe: &str) {
            let mut rows = self.rows.lock().unwrap();
            let series = rows.entry(timeframe.to_string()).or_default();
            let next = series.len();
            series.push(row(next));
        }

        fn fail_next(&self, timeframe: &str, error: MarketDataError) {
            self.failures
                .lock()
                .unwrap()
                .entry(timeframe.to_string())
                .or_default()
                .push_back(error);
        }

        fn set_lagging(&self, timeframe: &str, lagging: bool) {
            let mut set = self.lagging.lock().unwrap();
            if lagging {
                set.insert(timeframe.to_string());
            } else {
                set.remove(timeframe);
            }
        }

        fn latest_open_time(&self, timeframe: &str) -> DateTime<Utc> {
            let rows = self.rows.lock().unwrap();
            let last = rows[timeframe].last().unwrap();
            DateTime::from_timestamp_millis(last.open_time_ms).unwrap()
        }

        fn call_log(&self) -> Vec<(String, usize, Instant)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn row(i: usize) -> RawCandle {
        let base = 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1;
        RawCandle {
            open_time_ms: START_MS + i as i64 * HOUR_MS,
            open: base,
            high: base + 1.5,
            low: base - 1.5,
            close: base + 0.4,
            volume: 1.0,
        }
    }

    #[async_trait]
    impl MarketData for FakeMarket {
        async fn fetch_candles(
            &self,
            _symbol: &str,
            timeframe: &Timeframe,
            limit: usize,
        ) -> Result<Vec<RawCandle>, MarketDataError> {
            self.calls
                .lock()
                .unwrap()
                .push((timeframe.to_string(), limit, Instant::now()));

            if let Some(error) = self
                .failures
                .lock()
                .unwrap()
                .get_mut(timeframe.as_str())
                .and_then(|queue| queue.pop_front())
            {
                return Err(error);
            }

            let rows = self.rows.lock().unwrap();
            let mut series = rows.get(timeframe.as_str()).cloned().unwrap_or_default();
            if limit > 1 && self.lagging.lock().unwrap().contains(timeframe.as_str()) {
                series.pop();
            }
            let skip = series.len().saturating_sub(limit);
            Ok(series.into_iter().skip(skip).collect())
        }
    }

    #[derive(Default)]
    struct FakeSink {
        reports: Mutex<Vec<Report>>,
        fail: bool,
    }

    #[async_trait]
    impl ReportSink for FakeSink {
        async fn send(&self, report: &Report) -> Result<(), DeliveryError> {
            self.reports.lock().unwrap().push(report.clone());
            if self.fail {
                return Err(DeliveryError::Rejected {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    impl FakeSink {
        fn report_sizes(&self) -> Vec<usize> {
            self.reports.lock().unwrap().iter().map(Report::len).collect()
        }
    }

    fn scheduler(
        market: Arc<FakeMarket>,
        sink: Arc<FakeSink>,
    ) -> CandleCloseScheduler<FakeMarket, FakeSink> {
        let analyzer = TimeframeAnalyzer::new(market, "BTCUSDT", CrossFallback::Bearish)
            .with_symbol_label("BTC/USDT");
        CandleCloseScheduler::new(
            analyzer,
            sink,
            default_timeframes(),
            CadenceSettings::default(),
        )
    }

    fn labels(timeframes: &[Timeframe]) -> Vec<&str> {
        timeframes.iter().map(Timeframe::as_str).collect()
    }

    #[test]
    fn test_next_wake_delay_aligns_to_boundary() {
        let interval = Duration::from_secs(15 * 60);
        let buffer = Duration::from_secs(5);

        let boundary_secs = 1_700_000_000 - 1_700_000_000 % 900;

        // 7m30s into the quarter -> next quarter plus buffer
        let now = DateTime::from_timestamp(boundary_secs + 450, 0).unwrap();
        assert_eq!(next_wake_delay(now, interval, buffer), Duration::from_secs(455));

        let on_boundary = DateTime::from_timestamp(boundary_secs, 0).unwrap();
        assert_eq!(next_wake_delay(on_boundary, interval, buffer), buffer);

        let just_after =
            DateTime::from_timestamp_millis(on_boundary.timestamp_millis() + 1).unwrap();
        assert_eq!(
            next_wake_delay(just_after, interval, buffer),
            Duration::from_millis(899_999) + buffer
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_seeds_state_and_sends_one_report() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink::default());
        let mut scheduler = scheduler(market.clone(), sink.clone());

        let outcome = scheduler.startup().await;

        assert_eq!(labels(&outcome.analyzed), vec!["1h", "4h", "1d"]);
        assert!(outcome.delivered);
        assert_eq!(sink.report_sizes(), vec![3]);

        let report = &sink.reports.lock().unwrap()[0];
        let order: Vec<&str> = report.entries.iter().map(|e| e.timeframe.as_str()).collect();
        assert_eq!(order, vec!["1h", "4h", "1d"]);
        assert_eq!(report.symbol, "BTC/USDT");

        for tf in ["1h", "4h", "1d"] {
            assert_eq!(
                scheduler.state().last_processed(&Timeframe::from(tf)),
                Some(market.latest_open_time(tf))
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_with_nothing_analyzed_sends_nothing() {
        let market = Arc::new(FakeMarket::default());
        let sink = Arc::new(FakeSink::default());
        let mut scheduler = scheduler(market, sink.clone());

        let outcome = scheduler.startup().await;

        assert!(outcome.analyzed.is_empty());
        assert_eq!(outcome.skipped.len(), 3);
        assert!(!outcome.report_sent());
        assert!(sink.report_sizes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_without_closures_sends_nothing() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink::default());
        let mut scheduler = scheduler(market.clone(), sink.clone());
        scheduler.startup().await;

        let outcome = scheduler.run_cycle().await;

        assert_eq!(labels(&outcome.unchanged), vec!["1h", "4h", "1d"]);
        assert!(outcome.analyzed.is_empty());
        assert!(!outcome.report_sent());
        assert_eq!(sink.report_sizes(), vec![3]);

        // probes only ask for the latest candle
        let probes: Vec<usize> = market.call_log()[3..].iter().map(|c| c.1).collect();
        assert_eq!(probes, vec![1, 1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_closures_batched_into_one_report() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink::default());
        let mut scheduler = scheduler(market, sink.clone());

        let outcome = scheduler.run_cycle().await;

        assert_eq!(labels(&outcome.analyzed), vec!["1h", "4h", "1d"]);
        assert_eq!(outcome.report_entries, 3);
        assert_eq!(sink.report_sizes(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_new_candles_are_processed() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink::default());
        let mut scheduler = scheduler(market.clone(), sink.clone());
        scheduler.startup().await;

        market.push_candle("1h");
        let outcome = scheduler.run_cycle().await;
        assert_eq!(labels(&outcome.analyzed), vec!["1h"]);
        assert_eq!(labels(&outcome.unchanged), vec!["4h", "1d"]);
        assert_eq!(sink.report_sizes(), vec![3, 1]);
        assert_eq!(
            scheduler.state().last_processed(&Timeframe::from("1h")),
            Some(market.latest_open_time("1h"))
        );

        // same candle seen again is not reprocessed
        let outcome = scheduler.run_cycle().await;
        assert!(outcome.analyzed.is_empty());
        assert_eq!(sink.report_sizes(), vec![3, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_backs_off_and_continues() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink::default());
        let mut scheduler = scheduler(market.clone(), sink.clone());

        market.fail_next("4h", MarketDataError::RateLimited("429 Too Many Requests".into()));
        let outcome = scheduler.run_cycle().await;

        assert_eq!(labels(&outcome.analyzed), vec!["1h", "1d"]);
        assert_eq!(outcome.probe_failures.len(), 1);
        assert_eq!(outcome.probe_failures[0].0, Timeframe::from("4h"));
        assert_eq!(sink.report_sizes(), vec![2]);
        assert_eq!(scheduler.state().last_processed(&Timeframe::from("4h")), None);

        let calls = market.call_log();
        let failed = calls.iter().position(|c| c.0 == "4h").unwrap();
        let gap = calls[failed + 1].2 - calls[failed].2;
        assert_eq!(calls[failed + 1].0, "1d");
        assert!(gap >= Duration::from_millis(1050) + Duration::from_secs(5));

        // 4h is picked up on the next cycle
        let outcome = scheduler.run_cycle().await;
        assert_eq!(labels(&outcome.analyzed), vec!["4h"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_spaced() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink::default());
        let mut scheduler = scheduler(market.clone(), sink);

        scheduler.run_cycle().await;

        let calls = market.call_log();
        assert_eq!(calls.len(), 6);
        for pair in calls.windows(2) {
            assert!(pair[1].2 - pair[0].2 >= Duration::from_millis(1050));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_analysis_rate_limit_skips_timeframe() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink::default());
        let mut scheduler = scheduler(market.clone(), sink.clone());

        // first 1h call is the startup analysis fetch
        market.fail_next("1h", MarketDataError::exchange("Way too many requests; IP banned"));
        let outcome = scheduler.startup().await;

        assert_eq!(labels(&outcome.analyzed), vec!["4h", "1d"]);
        assert!(outcome.skipped[0].1.is_rate_limited());
        assert_eq!(scheduler.state().last_processed(&Timeframe::from("1h")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_failure_keeps_state() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink {
            fail: true,
            ..Default::default()
        });
        let mut scheduler = scheduler(market.clone(), sink.clone());

        let outcome = scheduler.run_cycle().await;
        assert_eq!(outcome.report_entries, 3);
        assert!(!outcome.delivered);
        assert_eq!(
            scheduler.state().last_processed(&Timeframe::from("1d")),
            Some(market.latest_open_time("1d"))
        );

        let outcome = scheduler.run_cycle().await;
        assert_eq!(outcome.unchanged.len(), 3);
        assert_eq!(sink.report_sizes(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_state_is_respected() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink::default());

        let mut state = SchedulingState::new(&default_timeframes());
        state.record(&Timeframe::from("1h"), market.latest_open_time("1h"));
        state.record(&Timeframe::from("1d"), market.latest_open_time("1d"));
        let mut scheduler = scheduler(market, sink.clone()).with_state(state);

        let outcome = scheduler.run_cycle().await;
        assert_eq!(labels(&outcome.analyzed), vec!["4h"]);
        assert_eq!(sink.report_sizes(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_history_is_not_reported_again() {
        let market = FakeMarket::with_history(120);
        let sink = Arc::new(FakeSink::default());
        let mut scheduler = scheduler(market.clone(), sink.clone());
        scheduler.startup().await;

        let tf = Timeframe::from("1h");
        let recorded = scheduler.state().last_processed(&tf).unwrap();

        // latest-candle request sees candle 120, history still ends at 119
        market.push_candle("1h");
        market.set_lagging("1h", true);
        let outcome = scheduler.run_cycle().await;

        assert!(outcome.analyzed.is_empty());
        assert!(!outcome.report_sent());
        assert_eq!(
            outcome.skipped,
            vec![(
                tf.clone(),
                SkipReason::StaleData {
                    as_of: recorded,
                    last_processed: recorded,
                }
            )]
        );
        assert_eq!(scheduler.state().last_processed(&tf), Some(recorded));
        assert_eq!(sink.report_sizes(), vec![3]);

        market.set_lagging("1h", false);
        let outcome = scheduler.run_cycle().await;
        assert_eq!(labels(&outcome.analyzed), vec!["1h"]);
        assert_eq!(
            scheduler.state().last_processed(&tf),
            Some(market.latest_open_time("1h"))
        );
        let reports = sink.reports.lock().unwrap();
        assert!(reports[1].entries[0].as_of > recorded);
    }
}
