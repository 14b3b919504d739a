use super::types::*;
use crate::candles::Candle;
use crate::config::CrossFallback;

const STRONG_CLOSE_RATIO: f64 = 0.8;
const WEAK_CLOSE_RATIO: f64 = 0.2;

pub fn candle_kind(candle: &Candle) -> CandleKind {
    if candle.close > candle.open {
        CandleKind::Bullish
    } else if candle.close < candle.open {
        CandleKind::Bearish
    } else {
        CandleKind::Neutral
    }
}

/// Describes where the candle closed within its range. No note for a candle
/// without a range.
pub fn price_action_note(candle: &Candle, kind: CandleKind) -> Option<String> {
    let range = candle.range();
    if range <= 0.0 {
        return None;
    }

    // Position of the close within the range, 0 at the low and 1 at the high.
    let ratio = (candle.close - candle.low) / range;
    let note = match kind {
        CandleKind::Bullish if ratio >= STRONG_CLOSE_RATIO => "strong bullish momentum",
        CandleKind::Bullish if ratio <= WEAK_CLOSE_RATIO => {
            "bullish reversal attempt (long lower wick)"
        }
        CandleKind::Bullish => "bullish candle",
        CandleKind::Bearish if ratio <= WEAK_CLOSE_RATIO => "strong bearish momentum",
        CandleKind::Bearish if ratio >= STRONG_CLOSE_RATIO => {
            "bearish reversal attempt (long upper wick)"
        }
        CandleKind::Bearish => "bearish candle",
        CandleKind::Neutral => "indecision in the market",
    };

    Some(note.to_string())
}

/// Price against the cloud. Undefined spans are never compared.
pub fn trend(close: f64, senkou_a: Option<f64>, senkou_b: Option<f64>) -> Trend {
    match (senkou_a, senkou_b) {
        (Some(a), Some(b)) if close > a && close > b => Trend::Bullish,
        (Some(a), Some(b)) if close < a && close < b => Trend::Bearish,
        _ => Trend::Sideways,
    }
}

pub fn ema_cross(short: Option<f64>, long: Option<f64>, fallback: CrossFallback) -> EmaCross {
    match (short, long) {
        (Some(s), Some(l)) if s > l => EmaCross::GoldenCross,
        (Some(_), Some(_)) => EmaCross::DeathCross,
        _ => match fallback {
            CrossFallback::Bearish => EmaCross::DeathCross,
            CrossFallback::Neutral => EmaCross::Unavailable,
        },
    }
}

pub fn stoch_cross(k: Option<f64>, d: Option<f64>, fallback: CrossFallback) -> StochCross {
    match (k, d) {
        (Some(k), Some(d)) if k > d => StochCross::BullishCross,
        (Some(_), Some(_)) => StochCross::BearishCross,
        _ => match fallback {
            CrossFallback::Bearish => StochCross::BearishCross,
            CrossFallback::Neutral => StochCross::Unavailable,
        },
    }
}

pub fn classify(
    last: &Candle,
    snapshot: &IndicatorSnapshot,
    fallback: CrossFallback,
) -> Classification {
    let kind = candle_kind(last);
    Classification {
        candle_kind: kind,
        price_action_note: price_action_note(last, kind),
        trend: trend(last.close, snapshot.senkou_a, snapshot.senkou_b),
        ema_cross: ema_cross(snapshot.ema_short, snapshot.ema_long, fallback),
        stoch_cross: stoch_cross(snapshot.stoch_k, snapshot.stoch_d, fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candles::{CandleSeries, RawCandle};
    use crate::config::default_timeframes;
    use crate::ta::indicators::compute;
    use chrono::DateTime;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open_time: DateTime::from_timestamp_millis(0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_single_candle_scenario() {
        let series = CandleSeries::from_raw(vec![RawCandle {
            open_time_ms: 1_700_000_000_000,
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 108.0,
            volume: 3.0,
        }]);
        let params = &default_timeframes()[0].params;
        let output = compute(&series, params);
        assert_eq!(output.snapshot, IndicatorSnapshot::default());

        let last = series.last().unwrap();
        let result = classify(last, &output.snapshot, CrossFallback::Bearish);
        assert_eq!(result.candle_kind, CandleKind::Bullish);
        // (108 - 95) / (110 - 95) = 0.867
        assert_eq!(result.price_action_note.as_deref(), Some("strong bullish momentum"));
        assert_eq!(result.trend, Trend::Sideways);
        assert_eq!(result.ema_cross, EmaCross::DeathCross);
        assert_eq!(result.stoch_cross, StochCross::BearishCross);
    }

    #[test]
    fn test_price_action_notes() {
        let note = |c: Candle| price_action_note(&c, candle_kind(&c));

        assert_eq!(note(candle(100.0, 110.0, 90.0, 102.0)).as_deref(), Some("bullish candle"));
        assert_eq!(
            note(candle(92.0, 110.0, 90.0, 93.0)).as_deref(),
            Some("bullish reversal attempt (long lower wick)")
        );
        assert_eq!(
            note(candle(100.0, 110.0, 90.0, 91.0)).as_deref(),
            Some("strong bearish momentum")
        );
        assert_eq!(
            note(candle(109.5, 110.0, 90.0, 108.0)).as_deref(),
            Some("bearish reversal attempt (long upper wick)")
        );
        assert_eq!(note(candle(105.0, 110.0, 90.0, 100.0)).as_deref(), Some("bearish candle"));
        assert_eq!(
            note(candle(100.0, 110.0, 90.0, 100.0)).as_deref(),
            Some("indecision in the market")
        );
        assert_eq!(note(candle(100.0, 100.0, 100.0, 100.0)), None);
    }

    #[test]
    fn test_ratio_thresholds_are_inclusive() {
        // close exactly at 80% of the range
        let c = candle(90.0, 100.0, 90.0, 98.0);
        assert_eq!(
            price_action_note(&c, CandleKind::Bullish).as_deref(),
            Some("strong bullish momentum")
        );
        // close exactly at 20% of the range
        let c = candle(99.0, 100.0, 90.0, 92.0);
        assert_eq!(
            price_action_note(&c, CandleKind::Bearish).as_deref(),
            Some("strong bearish momentum")
        );
    }

    #[test]
    fn test_trend_against_cloud() {
        assert_eq!(trend(120.0, Some(100.0), Some(110.0)), Trend::Bullish);
        assert_eq!(trend(90.0, Some(100.0), Some(110.0)), Trend::Bearish);
        assert_eq!(trend(105.0, Some(100.0), Some(110.0)), Trend::Sideways);
        assert_eq!(trend(110.0, Some(100.0), Some(110.0)), Trend::Sideways);
    }

    #[test]
    fn test_trend_is_sideways_with_undefined_span() {
        for close in [0.0, 50.0, 1e9] {
            assert_eq!(trend(close, None, Some(10.0)), Trend::Sideways);
            assert_eq!(trend(close, Some(10.0), None), Trend::Sideways);
            assert_eq!(trend(close, None, None), Trend::Sideways);
        }
    }

    #[test]
    fn test_ema_cross_follows_literal_comparison() {
        assert_eq!(
            ema_cross(Some(12.0), Some(10.0), CrossFallback::Bearish),
            EmaCross::GoldenCross
        );
        assert_eq!(
            ema_cross(Some(10.0), Some(12.0), CrossFallback::Bearish),
            EmaCross::DeathCross
        );
        assert_eq!(
            ema_cross(Some(10.0), Some(10.0), CrossFallback::Bearish),
            EmaCross::DeathCross
        );
    }

    #[test]
    fn test_cross_fallback_on_undefined_inputs() {
        assert_eq!(ema_cross(None, Some(1.0), CrossFallback::Bearish), EmaCross::DeathCross);
        assert_eq!(ema_cross(Some(2.0), None, CrossFallback::Neutral), EmaCross::Unavailable);
        assert_eq!(stoch_cross(None, None, CrossFallback::Bearish), StochCross::BearishCross);
        assert_eq!(stoch_cross(Some(80.0), None, CrossFallback::Neutral), StochCross::Unavailable);
        assert_eq!(
            stoch_cross(Some(80.0), Some(70.0), CrossFallback::Neutral),
            StochCross::BullishCross
        );
    }
}
