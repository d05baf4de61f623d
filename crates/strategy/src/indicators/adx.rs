/// ADX-14: Wilder's average directional index, derived from smoothed +DI/-DI.
/// `None` until `2 * period` bars have accumulated (one period to seed the
/// directional movement averages, another to seed the ADX itself).
pub fn adx_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if n < 2 * period + 1 {
        return out;
    }

    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    let mut tr = vec![0.0; n];

    for i in 1..n {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        plus_dm[i] = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        minus_dm[i] = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        let hl = highs[i] - lows[i];
        let hc = (highs[i] - closes[i - 1]).abs();
        let lc = (lows[i] - closes[i - 1]).abs();
        tr[i] = hl.max(hc).max(lc);
    }

    let mut smoothed_tr: f64 = tr[1..=period].iter().sum();
    let mut smoothed_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut smoothed_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx_series = vec![None; n];
    let dx_at = |plus: f64, minus: f64, atr: f64| -> f64 {
        if atr == 0.0 {
            return 0.0;
        }
        let plus_di = 100.0 * plus / atr;
        let minus_di = 100.0 * minus / atr;
        let sum = plus_di + minus_di;
        if sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / sum
        }
    };
    dx_series[period] = Some(dx_at(smoothed_plus, smoothed_minus, smoothed_tr));

    for i in (period + 1)..n {
        smoothed_tr = smoothed_tr - smoothed_tr / period as f64 + tr[i];
        smoothed_plus = smoothed_plus - smoothed_plus / period as f64 + plus_dm[i];
        smoothed_minus = smoothed_minus - smoothed_minus / period as f64 + minus_dm[i];
        dx_series[i] = Some(dx_at(smoothed_plus, smoothed_minus, smoothed_tr));
    }

    // ADX is the Wilder-smoothed average of DX, itself needing `period` DX values.
    let first_dx_idx = period;
    let seed_end = first_dx_idx + period;
    if seed_end >= n {
        return out;
    }
    let seed_values: Vec<f64> = dx_series[first_dx_idx..=seed_end - 1]
        .iter()
        .filter_map(|v| *v)
        .collect();
    if seed_values.len() < period {
        return out;
    }
    let mut adx = seed_values.iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = Some(adx);

    for i in seed_end..n {
        if let Some(dx) = dx_series[i] {
            adx = (adx * (period - 1) as f64 + dx) / period as f64;
            out[i] = Some(adx);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_history_is_none() {
        let n = 10;
        let highs = vec![101.0; n];
        let lows = vec![99.0; n];
        let closes = vec![100.0; n];
        let series = adx_series(&highs, &lows, &closes, 14);
        assert!(series.iter().all(|v| v.is_none()));
    }

    #[test]
    fn strong_trend_yields_high_adx() {
        let n = 60;
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 2.0).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        let series = adx_series(&highs, &lows, &closes, 14);
        let last = series.last().unwrap().unwrap();
        assert!(last > 20.0, "expected a trending ADX, got {last}");
    }
}
