/// Average True Range (Wilder smoothing), period 14 by default. `None` until
/// `period + 1` bars of history are available (true range needs a previous close).
pub fn atr_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if n < period + 1 {
        return out;
    }

    let true_range = |i: usize| -> f64 {
        let hl = highs[i] - lows[i];
        let hc = (highs[i] - closes[i - 1]).abs();
        let lc = (lows[i] - closes[i - 1]).abs();
        hl.max(hc).max(lc)
    };

    let first_atr: f64 = (1..=period).map(true_range).sum::<f64>() / period as f64;
    out[period] = Some(first_atr);

    let mut atr = first_atr;
    for i in (period + 1)..n {
        let tr = true_range(i);
        atr = (atr * (period - 1) as f64 + tr) / period as f64;
        out[i] = Some(atr);
    }

    out
}

/// Trailing simple mean of an already-partial `Option<f64>` series, used to
/// derive `atr_ratio = ATR / rolling_mean(ATR, 50)`.
pub fn rolling_mean(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let n = series.len();
    let mut out = vec![None; n];
    for i in 0..n {
        if i + 1 < period {
            continue;
        }
        let window = &series[i + 1 - period..=i];
        if window.iter().any(|v| v.is_none()) {
            continue;
        }
        let sum: f64 = window.iter().map(|v| v.unwrap()).sum();
        out[i] = Some(sum / period as f64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_range_gives_constant_atr() {
        let n = 30;
        let highs = vec![101.0; n];
        let lows = vec![99.0; n];
        let closes = vec![100.0; n];
        let series = atr_series(&highs, &lows, &closes, 14);
        let last = series.last().unwrap().unwrap();
        assert!((last - 2.0).abs() < 1e-6);
    }

    #[test]
    fn rolling_mean_needs_full_window() {
        let series = vec![Some(1.0), Some(2.0), Some(3.0)];
        let out = rolling_mean(&series, 5);
        assert!(out.iter().all(|v| v.is_none()));
    }
}
