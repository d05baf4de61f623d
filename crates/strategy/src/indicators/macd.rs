use super::ema::ema_series;

/// MACD 12/26/9: the line, its signal EMA, and the histogram, each aligned to
/// `closes` and `None` until enough history has accumulated.
pub fn macd_series(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = closes.len();
    let mut line = vec![None; n];
    let mut sig = vec![None; n];
    let mut hist = vec![None; n];

    let Some(fast_ema) = ema_series(closes, fast) else {
        return (line, sig, hist);
    };
    let Some(slow_ema) = ema_series(closes, slow) else {
        return (line, sig, hist);
    };

    // fast_ema/slow_ema are shorter than `closes` by (period - 1); align by offset.
    let fast_offset = fast - 1;
    let slow_offset = slow - 1;

    let mut macd_values: Vec<f64> = Vec::with_capacity(n);
    let mut macd_start = None;
    for i in slow_offset..n {
        let f = fast_ema[i - fast_offset];
        let s = slow_ema[i - slow_offset];
        let value = f - s;
        line[i] = Some(value);
        if macd_start.is_none() {
            macd_start = Some(i);
        }
        macd_values.push(value);
    }

    let Some(start) = macd_start else {
        return (line, sig, hist);
    };

    let Some(signal_ema) = ema_series(&macd_values, signal) else {
        return (line, sig, hist);
    };
    let signal_offset = signal - 1;
    for (i, &value) in signal_ema.iter().enumerate() {
        let idx = start + signal_offset + i;
        if idx >= n {
            break;
        }
        sig[idx] = Some(value);
        if let Some(macd_val) = line[idx] {
            hist[idx] = Some(macd_val - value);
        }
    }

    (line, sig, hist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_yields_all_none() {
        let closes = vec![100.0; 30];
        let (line, sig, hist) = macd_series(&closes, 12, 26, 9);
        assert!(line.iter().all(|v| v.is_none()));
        assert!(sig.iter().all(|v| v.is_none()));
        assert!(hist.iter().all(|v| v.is_none()));
    }

    #[test]
    fn enough_data_produces_trailing_values() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 0.3).collect();
        let (line, sig, hist) = macd_series(&closes, 12, 26, 9);
        assert!(line.last().unwrap().is_some());
        assert!(sig.last().unwrap().is_some());
        assert!(hist.last().unwrap().is_some());
    }

    #[test]
    fn uptrend_has_positive_macd_line() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
        let (line, _, _) = macd_series(&closes, 12, 26, 9);
        assert!(line.last().unwrap().unwrap() > 0.0);
    }
}
