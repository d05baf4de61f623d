/// On-Balance Volume: a running sum that adds volume on an up close, subtracts
/// it on a down close, and carries forward unchanged on a flat close.
pub fn obv_series(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return out;
    }

    out.push(0.0);
    for i in 1..closes.len() {
        let prev = out[i - 1];
        let next = if closes[i] > closes[i - 1] {
            prev + volumes[i]
        } else if closes[i] < closes[i - 1] {
            prev - volumes[i]
        } else {
            prev
        };
        out.push(next);
    }
    out
}

/// Single-step log return and percent return, aligned to `closes`; index 0
/// has no prior bar and is `None`.
pub fn log_return_series(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    for i in 1..closes.len() {
        if closes[i - 1] > 0.0 && closes[i] > 0.0 {
            out[i] = Some((closes[i] / closes[i - 1]).ln());
        }
    }
    out
}

pub fn percent_return_series(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    for i in 1..closes.len() {
        if closes[i - 1] != 0.0 {
            out[i] = Some((closes[i] - closes[i - 1]) / closes[i - 1]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obv_accumulates_on_up_moves() {
        let closes = vec![10.0, 11.0, 10.5, 12.0];
        let volumes = vec![1.0, 2.0, 3.0, 4.0];
        let obv = obv_series(&closes, &volumes);
        assert_eq!(obv, vec![0.0, 2.0, -1.0, 3.0]);
    }

    #[test]
    fn returns_first_entry_is_none() {
        let closes = vec![100.0, 110.0, 99.0];
        assert!(log_return_series(&closes)[0].is_none());
        assert!(percent_return_series(&closes)[0].is_none());
        assert!(percent_return_series(&closes)[1].unwrap() > 0.0);
    }
}
