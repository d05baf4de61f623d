/// Stochastic oscillator 14/3/3: %K smoothed over `smooth_k`, %D the
/// `d`-period SMA of %K. Returns `(k, d)` series aligned to the input,
/// `None` entries until each has enough history.
pub fn stochastic_series(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
    smooth_k: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = closes.len();
    let mut raw_k = vec![None; n];

    for i in 0..n {
        if i + 1 < k_period {
            continue;
        }
        let window_start = i + 1 - k_period;
        let highest = highs[window_start..=i].iter().cloned().fold(f64::MIN, f64::max);
        let lowest = lows[window_start..=i].iter().cloned().fold(f64::MAX, f64::min);
        let range = highest - lowest;
        raw_k[i] = Some(if range == 0.0 {
            50.0
        } else {
            (closes[i] - lowest) / range * 100.0
        });
    }

    let k = sma_over_options(&raw_k, smooth_k);
    let d = sma_over_options(&k, d_period);
    (k, d)
}

fn sma_over_options(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
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
    fn insufficient_history_is_none() {
        let highs = vec![10.0; 5];
        let lows = vec![9.0; 5];
        let closes = vec![9.5; 5];
        let (k, d) = stochastic_series(&highs, &lows, &closes, 14, 3, 3);
        assert!(k.iter().all(|v| v.is_none()));
        assert!(d.iter().all(|v| v.is_none()));
    }

    #[test]
    fn values_stay_within_0_100() {
        let n = 60;
        let highs: Vec<f64> = (0..n).map(|i| 100.0 + (i % 10) as f64).collect();
        let lows: Vec<f64> = (0..n).map(|i| 95.0 + (i % 7) as f64).collect();
        let closes: Vec<f64> = (0..n).map(|i| 97.0 + (i % 8) as f64).collect();
        let (k, d) = stochastic_series(&highs, &lows, &closes, 14, 3, 3);
        for v in k.into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
        for v in d.into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
