use chrono::{DateTime, Datelike, Timelike, Utc};

use common::Candle;

use crate::indicators::{
    adx_series, atr_series, bollinger_series, ema_series, log_return_series, macd_series,
    obv_series, percent_return_series, rolling_mean, rsi_series, stochastic_series,
};

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const STOCH_K: usize = 14;
const STOCH_D: usize = 3;
const STOCH_SMOOTH_K: usize = 3;
const ADX_PERIOD: usize = 14;
const EMA_SHORT: usize = 20;
const EMA_MID: usize = 50;
const EMA_LONG: usize = 120;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_STD: f64 = 2.0;
const ATR_PERIOD: usize = 14;
const ATR_RATIO_WINDOW: usize = 50;

/// One fully-populated row of the indicator pipeline (spec §4.4), aligned to
/// a single finalized candle. Only rows where every indicator has warmed up
/// are ever constructed — `compute_feature_rows` drops the NaN prefix.
#[derive(Debug, Clone, Copy)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rsi_14: f64,
    pub rsi_change: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub adx_14: f64,
    pub ema_20: f64,
    pub ema_50: f64,
    pub ema_120: f64,
    pub bb_upper: f64,
    pub bb_mid: f64,
    pub bb_lower: f64,
    pub atr_14: f64,
    pub atr_ratio: f64,
    pub obv: f64,
    pub log_return_1: f64,
    pub percent_return_1: f64,
    pub price_vs_ema_long: f64,
    pub hour_of_day: u32,
    pub day_of_week: u32,
}

impl FeatureRow {
    /// Column order used by `MomentumClassifier`/`VolatilityClassifier` when
    /// they scale and feed a sequence of rows — order must stay stable since
    /// the scalers z-score each column independently.
    pub fn as_vector(&self) -> Vec<f64> {
        vec![
            self.rsi_14,
            self.rsi_change,
            self.macd_line,
            self.macd_signal,
            self.macd_hist,
            self.stoch_k,
            self.stoch_d,
            self.adx_14,
            self.ema_20,
            self.ema_50,
            self.ema_120,
            self.bb_upper,
            self.bb_mid,
            self.bb_lower,
            self.atr_14,
            self.atr_ratio,
            self.obv,
            self.log_return_1,
            self.percent_return_1,
            self.price_vs_ema_long,
        ]
    }
}

/// Run the full indicator pipeline over a candle history and drop every row
/// that hasn't warmed up yet (spec §4.4: "rows with NaN after indicator
/// warm-up are dropped").
pub fn compute_feature_rows(candles: &[Candle]) -> Vec<FeatureRow> {
    let n = candles.len();
    if n == 0 {
        return Vec::new();
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let rsi = rsi_series(&closes, RSI_PERIOD);
    let rsi_change = diff(&rsi);
    let (macd_line, macd_signal, macd_hist) =
        macd_series(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let (stoch_k, stoch_d) =
        stochastic_series(&highs, &lows, &closes, STOCH_K, STOCH_D, STOCH_SMOOTH_K);
    let adx = adx_series(&highs, &lows, &closes, ADX_PERIOD);
    let ema20 = align(ema_series(&closes, EMA_SHORT), n, EMA_SHORT);
    let ema50 = align(ema_series(&closes, EMA_MID), n, EMA_MID);
    let ema120 = align(ema_series(&closes, EMA_LONG), n, EMA_LONG);
    let (bb_upper, bb_mid, bb_lower) = bollinger_series(&closes, BOLLINGER_PERIOD, BOLLINGER_STD);
    let atr = atr_series(&highs, &lows, &closes, ATR_PERIOD);
    let atr_mean = rolling_mean(&atr, ATR_RATIO_WINDOW);
    let obv = obv_series(&closes, &volumes);
    let log_ret = log_return_series(&closes);
    let pct_ret = percent_return_series(&closes);

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let row = (|| {
            Some(FeatureRow {
                timestamp: candles[i].start_time,
                close: closes[i],
                rsi_14: rsi[i]?,
                rsi_change: rsi_change[i]?,
                macd_line: macd_line[i]?,
                macd_signal: macd_signal[i]?,
                macd_hist: macd_hist[i]?,
                stoch_k: stoch_k[i]?,
                stoch_d: stoch_d[i]?,
                adx_14: adx[i]?,
                ema_20: ema20[i]?,
                ema_50: ema50[i]?,
                ema_120: ema120[i]?,
                bb_upper: bb_upper[i]?,
                bb_mid: bb_mid[i]?,
                bb_lower: bb_lower[i]?,
                atr_14: atr[i]?,
                atr_ratio: {
                    let a = atr[i]?;
                    let m = atr_mean[i]?;
                    if m == 0.0 {
                        return None;
                    }
                    a / m
                },
                obv: obv[i],
                log_return_1: log_ret[i]?,
                percent_return_1: pct_ret[i]?,
                price_vs_ema_long: {
                    let long = ema120[i]?;
                    if long == 0.0 {
                        return None;
                    }
                    (closes[i] - long) / long
                },
                hour_of_day: candles[i].start_time.hour(),
                day_of_week: candles[i].start_time.weekday().num_days_from_monday(),
            })
        })();

        if let Some(row) = row {
            rows.push(row);
        }
    }

    rows
}

fn diff(series: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = vec![None; series.len()];
    for i in 1..series.len() {
        if let (Some(a), Some(b)) = (series[i], series[i - 1]) {
            out[i] = Some(a - b);
        }
    }
    out
}

/// `ema_series` returns a slice shorter than the input by `period - 1`
/// (no leading warm-up entries); re-align it to the full candle length with
/// a `None` prefix so every series shares the same index space.
fn align(series: Option<Vec<f64>>, full_len: usize, period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; full_len];
    let Some(series) = series else {
        return out;
    };
    let offset = period - 1;
    for (i, v) in series.into_iter().enumerate() {
        out[offset + i] = Some(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(i: i64, close: f64) -> Candle {
        Candle {
            start_time: Utc.timestamp_opt(i * 3600, 0).unwrap(),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn short_history_produces_no_rows() {
        let candles: Vec<Candle> = (0..10).map(|i| candle(i, 100.0 + i as f64)).collect();
        let rows = compute_feature_rows(&candles);
        assert!(rows.is_empty());
    }

    #[test]
    fn long_history_produces_trailing_rows() {
        let candles: Vec<Candle> = (0..200)
            .map(|i| candle(i, 100.0 + (i as f64 * 0.1).sin() * 10.0 + i as f64 * 0.05))
            .collect();
        let rows = compute_feature_rows(&candles);
        assert!(!rows.is_empty());
        assert!(rows.len() < candles.len());
        for row in &rows {
            assert!(row.rsi_14.is_finite());
            assert!(row.atr_ratio.is_finite());
        }
    }
}
