use super::types::*;
use crate::candles::CandleSeries;
use crate::config::IndicatorParameters;

/// Rolling simple average over optional values. A window containing an
/// undefined value is undefined.
fn calculate_sma(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[(i + 1 - period)..=i];
        let sum: Option<f64> = window.iter().copied().sum();
        out[i] = sum.map(|s| s / period as f64);
    }

    out
}

/// Exponential moving average seeded with the simple average of the first
/// `period` prices. The first `period - 1` outputs are undefined.
pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = prices[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(seed);

    let mut prev = seed;
    for i in period..prices.len() {
        prev = alpha * prices[i] + (1.0 - alpha) * prev;
        out[i] = Some(prev);
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

/// RSI with Wilder smoothing. Undefined until `period + 1` prices exist.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period + 1 {
        return out;
    }

    let mut gains = vec![0.0; prices.len()];
    let mut losses = vec![0.0; prices.len()];
    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    let mut avg_gain = gains[1..=period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[1..=period].iter().sum::<f64>() / period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    let p = period as f64;
    for i in (period + 1)..prices.len() {
        avg_gain = (avg_gain * (p - 1.0) + gains[i]) / p;
        avg_loss = (avg_loss * (p - 1.0) + losses[i]) / p;
        out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

fn highest_lowest(highs: &[f64], lows: &[f64], end: usize, period: usize) -> (f64, f64) {
    let start = end + 1 - period;
    let highest = highs[start..=end].iter().copied().fold(f64::MIN, f64::max);
    let lowest = lows[start..=end].iter().copied().fold(f64::MAX, f64::min);
    (highest, lowest)
}

/// Stochastic oscillator. Returns (%K, %D), both on a 0-100 scale.
///
/// Raw %K compares the close with the `k`-period high/low range and is
/// undefined when that range is zero. %K is raw %K averaged over `smooth`
/// candles and %D is %K averaged over `d` candles.
pub fn calculate_stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k: usize,
    d: usize,
    smooth: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let len = closes.len().min(highs.len()).min(lows.len());
    let mut raw_k = vec![None; len];

    if k > 0 && len >= k {
        for i in (k - 1)..len {
            let (highest, lowest) = highest_lowest(highs, lows, i, k);
            let range = highest - lowest;
            if range > 0.0 {
                raw_k[i] = Some((closes[i] - lowest) / range * 100.0);
            }
        }
    }

    let stoch_k = calculate_sma(&raw_k, smooth.max(1));
    let stoch_d = calculate_sma(&stoch_k, d);
    (stoch_k, stoch_d)
}

fn calculate_midpoint(highs: &[f64], lows: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = highs.len().min(lows.len());
    let mut out = vec![None; len];
    if period == 0 || len < period {
        return out;
    }

    for i in (period - 1)..len {
        let (highest, lowest) = highest_lowest(highs, lows, i, period);
        out[i] = Some((highest + lowest) / 2.0);
    }

    out
}

/// Senkou spans as computed on each candle, before the forward projection.
/// Index `i` holds the spans produced by candle `i`, which apply to candle
/// `i + medium`.
pub fn ichimoku_spans_raw(
    highs: &[f64],
    lows: &[f64],
    fast: usize,
    medium: usize,
    slow: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let tenkan = calculate_midpoint(highs, lows, fast);
    let kijun = calculate_midpoint(highs, lows, medium);
    let span_a = tenkan
        .iter()
        .zip(kijun.iter())
        .map(|(t, k)| match (t, k) {
            (Some(t), Some(k)) => Some((t + k) / 2.0),
            _ => None,
        })
        .collect();
    let span_b = calculate_midpoint(highs, lows, slow);
    (span_a, span_b)
}

fn shift_forward(values: &[Option<f64>], offset: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(offset).and_then(|j| values[j]))
        .collect()
}

/// Cloud boundaries that apply to each candle: the raw spans read `medium`
/// candles back. Both spans are undefined wherever Senkou B is, so the
/// current candle has a cloud only with `slow + medium` candles of history.
pub fn ichimoku_cloud(
    highs: &[f64],
    lows: &[f64],
    fast: usize,
    medium: usize,
    slow: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let (raw_a, raw_b) = ichimoku_spans_raw(highs, lows, fast, medium, slow);
    let span_b = shift_forward(&raw_b, medium);
    let span_a = shift_forward(&raw_a, medium)
        .into_iter()
        .zip(span_b.iter())
        .map(|(a, b)| b.and(a))
        .collect();
    (span_a, span_b)
}

/// Per-candle indicator columns for the whole series, Senkou spans already
/// shifted onto the candle they apply to.
pub fn indicator_series(series: &CandleSeries, params: &IndicatorParameters) -> IndicatorSeries {
    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();

    let (stoch_k, stoch_d) = calculate_stochastic(
        &highs,
        &lows,
        &closes,
        params.stoch_k,
        params.stoch_d,
        params.stoch_smooth,
    );
    let (senkou_a, senkou_b) = ichimoku_cloud(
        &highs,
        &lows,
        params.ichimoku_fast,
        params.ichimoku_medium,
        params.ichimoku_slow,
    );

    IndicatorSeries {
        ema_short: calculate_ema(&closes, params.ema_short),
        ema_long: calculate_ema(&closes, params.ema_long),
        rsi: calculate_rsi(&closes, params.rsi_period),
        stoch_k,
        stoch_d,
        senkou_a,
        senkou_b,
    }
}

/// Computes every indicator for the latest candle. Short series are not an
/// error: each indicator is undefined until it has enough history and the
/// output records whether the warm-up was complete.
pub fn compute(series: &CandleSeries, params: &IndicatorParameters) -> IndicatorOutput {
    let required = params.full_history();
    let warmup = if series.len() >= required {
        Warmup::Complete
    } else {
        Warmup::Partial {
            available: series.len(),
            required,
        }
    };

    IndicatorOutput {
        snapshot: indicator_series(series, params).latest(),
        warmup,
    }
}
