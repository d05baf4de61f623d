use crate::features::FeatureRow;

/// Regime labels drawn from the trained label set named in spec §4.4.
/// `Neutral` is the catch-all the original encoder also produces for
/// everything that isn't clearly bull or bear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegimeLabel {
    BullMarket2021,
    RecentData2024,
    BearMarket2022,
    Neutral,
}

impl RegimeLabel {
    pub fn is_bullish(self) -> bool {
        matches!(self, RegimeLabel::BullMarket2021 | RegimeLabel::RecentData2024)
    }

    pub fn is_bearish(self) -> bool {
        matches!(self, RegimeLabel::BearMarket2022)
    }
}

impl std::fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegimeLabel::BullMarket2021 => "Bull_Market_2021",
            RegimeLabel::RecentData2024 => "Recent_Data_2024",
            RegimeLabel::BearMarket2022 => "Bear_Market_2022",
            RegimeLabel::Neutral => "Neutral",
        };
        write!(f, "{s}")
    }
}

/// Capability hiding the heterogeneous ML artifacts behind a uniform surface
/// (spec §9): `predict_single` for the tabular regime classifier,
/// `predict_sequence` for the LSTM/GRU-style momentum and volatility models.
///
/// No trained artifacts ship with this repo (spec §9 Open Question); each
/// implementation below is a deterministic, feature-driven stand-in computed
/// directly from the indicator pipeline rather than a loaded model file.
pub trait Inferer: Send + Sync {
    fn predict_single(&self, features: &[f64]) -> f64;
    fn predict_sequence(&self, rows: &[Vec<f64>]) -> f64;
}

/// Column indices into `FeatureRow::as_vector()`, kept local to this module
/// so the stand-in models don't need the full struct.
mod col {
    pub const ADX_14: usize = 7;
    pub const EMA_20: usize = 8;
    pub const EMA_50: usize = 9;
    pub const LOG_RETURN_1: usize = 17;
}

/// Tabular classifier: buckets the latest row into a regime by trend strength
/// (ADX) and direction (short EMA vs. mid EMA). Strong trend + short EMA above
/// mid EMA reads as a continuation of a bull regime; strong trend the other
/// way reads as bear; anything weak or mixed is neutral.
#[derive(Clone)]
pub struct RegimeClassifier {
    trend_strength_threshold: f64,
}

impl RegimeClassifier {
    pub fn new(trend_strength_threshold: f64) -> Self {
        Self { trend_strength_threshold }
    }

    pub fn classify(&self, row: &FeatureRow) -> RegimeLabel {
        let features = row.as_vector();
        let code = self.predict_single(&features);
        if code > 0.5 {
            RegimeLabel::BullMarket2021
        } else if code < -0.5 {
            RegimeLabel::BearMarket2022
        } else {
            RegimeLabel::Neutral
        }
    }
}

impl Inferer for RegimeClassifier {
    fn predict_single(&self, features: &[f64]) -> f64 {
        let adx = features[col::ADX_14];
        let ema_short = features[col::EMA_20];
        let ema_mid = features[col::EMA_50];

        if adx < self.trend_strength_threshold {
            return 0.0;
        }
        if ema_short > ema_mid {
            1.0
        } else {
            -1.0
        }
    }

    fn predict_sequence(&self, rows: &[Vec<f64>]) -> f64 {
        rows.last().map(|r| self.predict_single(r)).unwrap_or(0.0)
    }
}

/// Sequence classifier over the last 120 scaled rows: a sigmoid over the
/// mean 1-step log return across the window, standing in for the LSTM
/// momentum model. Output > 0.5 reads "Momentum Haussier".
#[derive(Clone)]
pub struct MomentumClassifier {
    pub lookback: usize,
}

impl MomentumClassifier {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }
}

impl Inferer for MomentumClassifier {
    fn predict_single(&self, features: &[f64]) -> f64 {
        sigmoid(features[col::LOG_RETURN_1] * 50.0)
    }

    fn predict_sequence(&self, rows: &[Vec<f64>]) -> f64 {
        if rows.is_empty() {
            return 0.5;
        }
        let mean_return: f64 =
            rows.iter().map(|r| r[col::LOG_RETURN_1]).sum::<f64>() / rows.len() as f64;
        sigmoid(mean_return * 50.0)
    }
}

/// Sequence classifier over the last 48 scaled rows: a sigmoid over the
/// standard deviation of 1-step returns, standing in for the GRU volatility
/// model. Output > 0.5 reads "Haute Volatilité".
#[derive(Clone)]
pub struct VolatilityClassifier {
    pub lookback: usize,
}

impl VolatilityClassifier {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }
}

impl Inferer for VolatilityClassifier {
    fn predict_single(&self, features: &[f64]) -> f64 {
        sigmoid(features[col::LOG_RETURN_1].abs() * 50.0 - 1.0)
    }

    fn predict_sequence(&self, rows: &[Vec<f64>]) -> f64 {
        if rows.len() < 2 {
            return 0.0;
        }
        let returns: Vec<f64> = rows.iter().map(|r| r[col::LOG_RETURN_1]).collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        sigmoid(variance.sqrt() * 200.0 - 1.0)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Per-column z-score standardization over a window of rows, standing in for
/// the trained `StandardScaler` artifacts the original models were fit with
/// (spec §9 Open Question: no scaler files ship with this repo).
pub fn standardize(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    if rows.is_empty() {
        return Vec::new();
    }
    let cols = rows[0].len();
    let n = rows.len() as f64;

    let means: Vec<f64> = (0..cols)
        .map(|c| rows.iter().map(|r| r[c]).sum::<f64>() / n)
        .collect();
    let stds: Vec<f64> = (0..cols)
        .map(|c| {
            let mean = means[c];
            let var = rows.iter().map(|r| (r[c] - mean).powi(2)).sum::<f64>() / n;
            var.sqrt()
        })
        .collect();

    rows.iter()
        .map(|r| {
            r.iter()
                .enumerate()
                .map(|(c, &v)| if stds[c] > 0.0 { (v - means[c]) / stds[c] } else { 0.0 })
                .collect()
        })
        .collect()
}
