/// Exponential moving average over the full series, for a single `period`.
/// Returns `None` until at least `period` closes are available.
pub fn ema_series(closes: &[f64], period: usize) -> Option<Vec<f64>> {
    if closes.len() < period || period == 0 {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(closes.len());
    let seed: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    out.push(seed);
    for &price in &closes[period..] {
        let prev = *out.last().unwrap();
        out.push(price * k + prev * (1.0 - k));
    }
    Some(out)
}

/// Latest EMA value for `period`, or `None` if there isn't enough history.
pub fn ema_latest(closes: &[f64], period: usize) -> Option<f64> {
    ema_series(closes, period).and_then(|s| s.last().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_needs_full_period() {
        assert!(ema_latest(&[1.0, 2.0], 20).is_none());
    }

    #[test]
    fn ema_converges_toward_constant_series() {
        let prices = vec![50.0; 30];
        let value = ema_latest(&prices, 20).unwrap();
        assert!((value - 50.0).abs() < 1e-6);
    }
}
