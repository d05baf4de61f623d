/// RSI-14 (Wilder's smoothed moving average), computed as a full series
/// aligned to `closes` so it can be folded into a `FeatureRow` per candle.
/// Entries before `period + 1` closes have accumulated are `None`.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if closes.len() < period + 1 {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let initial = &changes[..period];

    let mut avg_gain = initial.iter().filter(|&&c| c > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss =
        initial.iter().filter(|&&c| c < 0.0).map(|c| c.abs()).sum::<f64>() / period as f64;

    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for (i, &change) in changes[period..].iter().enumerate() {
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        out[period + 1 + i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_entries_are_none_until_warm() {
        let closes = vec![100.0; 14];
        let series = rsi_series(&closes, 14);
        assert!(series.iter().all(|v| v.is_none()));
    }

    #[test]
    fn all_gains_converges_to_100() {
        let closes: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let series = rsi_series(&closes, 14);
        let last = series.last().unwrap().unwrap();
        assert!((last - 100.0).abs() < 1e-6);
    }

    #[test]
    fn values_stay_in_bounds() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09, 43.90, 44.50,
        ];
        let series = rsi_series(&closes, 14);
        for v in series.into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
