/// Bollinger Bands 20/2: `(upper, mid, lower)` series, `mid` the `period`-SMA
/// and the bands `std_mult` standard deviations away from it.
pub fn bollinger_series(
    closes: &[f64],
    period: usize,
    std_mult: f64,
) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = closes.len();
    let mut upper = vec![None; n];
    let mut mid = vec![None; n];
    let mut lower = vec![None; n];

    for i in 0..n {
        if i + 1 < period {
            continue;
        }
        let window = &closes[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();

        mid[i] = Some(mean);
        upper[i] = Some(mean + std_mult * std);
        lower[i] = Some(mean - std_mult * std);
    }

    (upper, mid, lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_has_zero_width_bands() {
        let closes = vec![100.0; 25];
        let (upper, mid, lower) = bollinger_series(&closes, 20, 2.0);
        let i = closes.len() - 1;
        assert!((upper[i].unwrap() - 100.0).abs() < 1e-9);
        assert!((mid[i].unwrap() - 100.0).abs() < 1e-9);
        assert!((lower[i].unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn upper_is_always_above_lower_once_populated() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.37).sin() * 5.0).collect();
        let (upper, _, lower) = bollinger_series(&closes, 20, 2.0);
        for (u, l) in upper.iter().zip(lower.iter()) {
            if let (Some(u), Some(l)) = (u, l) {
                assert!(u >= l);
            }
        }
    }
}
