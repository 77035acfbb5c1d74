//! Hand-rolled technical indicators. No external TA crate — see the design
//! notes on keeping external dependencies protocol-level only.

use crate::domain::candle::Candle;

/// Exponential moving average over `closes`, seeded with a simple average of
/// the first `window` values. Returns one value per input bar once enough
/// history exists; `None` entries pad the warm-up period.
pub fn ema(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if closes.len() < window || window == 0 {
        return out;
    }
    let seed: f64 = closes[..window].iter().sum::<f64>() / window as f64;
    out[window - 1] = Some(seed);
    let alpha = 2.0 / (window as f64 + 1.0);
    let mut prev = seed;
    for (i, &close) in closes.iter().enumerate().skip(window) {
        let value = (close - prev) * alpha + prev;
        out[i] = Some(value);
        prev = value;
    }
    out
}

/// Wilder-smoothed moving average, used for ATR/ADX's internal series.
fn wilder_smooth(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if values.len() < window || window == 0 {
        return out;
    }
    let seed: f64 = values[..window].iter().sum::<f64>() / window as f64;
    out[window - 1] = Some(seed);
    let mut prev = seed;
    for (i, &value) in values.iter().enumerate().skip(window) {
        let smoothed = (prev * (window as f64 - 1.0) + value) / window as f64;
        out[i] = Some(smoothed);
        prev = smoothed;
    }
    out
}

fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = vec![0.0; candles.len()];
    for i in 0..candles.len() {
        if i == 0 {
            tr[i] = candles[i].high - candles[i].low;
        } else {
            let prev_close = candles[i - 1].close;
            tr[i] = (candles[i].high - candles[i].low)
                .max((candles[i].high - prev_close).abs())
                .max((candles[i].low - prev_close).abs());
        }
    }
    tr
}

/// Wilder's Average True Range.
pub fn atr(candles: &[Candle], window: usize) -> Vec<Option<f64>> {
    let tr = true_range(candles);
    wilder_smooth(&tr, window)
}

/// Wilder's Average Directional Index. Needs `window` bars of warm-up for
/// the directional movement series plus `window` more to smooth the DX
/// series itself.
pub fn adx(candles: &[Candle], window: usize) -> Vec<Option<f64>> {
    let n = candles.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up_move = candles[i].high - candles[i - 1].high;
        let down_move = candles[i - 1].low - candles[i].low;
        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
    }
    let tr = true_range(candles);
    let smoothed_tr = wilder_smooth(&tr, window);
    let smoothed_plus_dm = wilder_smooth(&plus_dm, window);
    let smoothed_minus_dm = wilder_smooth(&minus_dm, window);

    let mut dx = vec![None; n];
    for i in 0..n {
        if let (Some(tr_s), Some(plus_s), Some(minus_s)) =
            (smoothed_tr[i], smoothed_plus_dm[i], smoothed_minus_dm[i])
        {
            if tr_s <= 0.0 {
                continue;
            }
            let plus_di = 100.0 * plus_s / tr_s;
            let minus_di = 100.0 * minus_s / tr_s;
            let denom = plus_di + minus_di;
            if denom > 0.0 {
                dx[i] = Some(100.0 * (plus_di - minus_di).abs() / denom);
            } else {
                dx[i] = Some(0.0);
            }
        }
    }

    let dx_values: Vec<f64> = dx.iter().map(|v| v.unwrap_or(0.0)).collect();
    let first_valid = dx.iter().position(Option::is_some).unwrap_or(n);
    if first_valid + window > n {
        return vec![None; n];
    }
    let mut out = vec![None; n];
    let seed: f64 =
        dx_values[first_valid..first_valid + window].iter().sum::<f64>() / window as f64;
    out[first_valid + window - 1] = Some(seed);
    let mut prev = seed;
    for i in (first_valid + window)..n {
        let smoothed = (prev * (window as f64 - 1.0) + dx_values[i]) / window as f64;
        out[i] = Some(smoothed);
        prev = smoothed;
    }
    out
}

/// Supertrend direction and line value per bar, following the band-tightening
/// recurrence: `final_upper` only moves down (tightens) or flips on a close
/// above it; `final_lower` mirrors it on the downside.
pub fn supertrend(candles: &[Candle], period: usize, multiplier: f64) -> (Vec<f64>, Vec<i8>) {
    let n = candles.len();
    let atr_values = atr(candles, period);
    let mut upper = vec![0.0; n];
    let mut lower = vec![0.0; n];
    for i in 0..n {
        let hl2 = (candles[i].high + candles[i].low) / 2.0;
        let a = atr_values[i].unwrap_or(0.0);
        upper[i] = hl2 + multiplier * a;
        lower[i] = hl2 - multiplier * a;
    }

    let mut final_upper = upper.clone();
    let mut final_lower = lower.clone();
    let mut line = vec![0.0; n];
    let mut direction = vec![1i8; n];

    if n > 0 && atr_values[0].is_some() {
        line[0] = lower[0];
    }

    for i in 1..n {
        if atr_values[i].is_none() {
            direction[i] = direction[i - 1];
            continue;
        }
        let prev_close = candles[i - 1].close;
        let prev_upper = final_upper[i - 1];
        let prev_lower = final_lower[i - 1];

        final_upper[i] = if upper[i] < prev_upper || prev_close > prev_upper {
            upper[i]
        } else {
            prev_upper
        };
        final_lower[i] = if lower[i] > prev_lower || prev_close < prev_lower {
            lower[i]
        } else {
            prev_lower
        };

        let prev_direction = direction[i - 1];
        let close_price = candles[i].close;
        direction[i] = if prev_direction == -1 && close_price > final_upper[i] {
            1
        } else if prev_direction == 1 && close_price < final_lower[i] {
            -1
        } else {
            prev_direction
        };

        line[i] = if direction[i] == 1 {
            final_lower[i]
        } else {
            final_upper[i]
        };
    }

    (line, direction)
}

/// Rolling max of `high` and rolling min of `low` over `window` bars,
/// shifted by one bar so the current bar is excluded from its own channel.
pub fn donchian_prev(candles: &[Candle], window: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = candles.len();
    let mut upper_prev = vec![None; n];
    let mut lower_prev = vec![None; n];
    for i in 0..n {
        if i < window {
            continue;
        }
        let start = i - window;
        let window_slice = &candles[start..i];
        let high = window_slice
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let low = window_slice
            .iter()
            .map(|c| c.low)
            .fold(f64::INFINITY, f64::min);
        upper_prev[i] = Some(high);
        lower_prev[i] = Some(low);
    }
    (upper_prev, lower_prev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Timeframe;
    use chrono::Utc;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::D1,
            open_time: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_ema_warms_up_then_tracks() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let values = ema(&closes, 3);
        assert!(values[0].is_none());
        assert!(values[1].is_none());
        assert!(values[2].is_some());
        assert!(values[4].unwrap() > values[2].unwrap());
    }

    #[test]
    fn test_donchian_prev_excludes_current_bar() {
        let candles: Vec<Candle> = (0..5)
            .map(|i| candle(100.0, 100.0 + i as f64, 100.0 - i as f64, 100.0))
            .collect();
        let (upper, lower) = donchian_prev(&candles, 3);
        assert!(upper[2].is_none());
        assert_eq!(upper[3], Some(102.0));
        assert_eq!(lower[3], Some(98.0));
    }

    #[test]
    fn test_supertrend_direction_starts_bullish() {
        let candles: Vec<Candle> = (0..15)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                candle(base, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        let (_line, direction) = supertrend(&candles, 10, 3.0);
        assert_eq!(*direction.last().unwrap(), 1);
    }
}
