use common::StrategyParams;

/// Scoring weights for the funnel (spec §4.4). Defaults mirror the original
/// implementation's shipped configuration.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub regime_bull: f64,
    pub regime_neutral: f64,
    pub regime_bear: f64,
    pub momentum_bull: f64,
    pub momentum_bear: f64,
    pub volatility_low: f64,
    pub volatility_high: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            regime_bull: 3.0,
            regime_neutral: 0.0,
            regime_bear: -5.0,
            momentum_bull: 3.0,
            momentum_bear: -3.0,
            volatility_low: 1.0,
            volatility_high: -5.0,
            rsi_oversold: 1.0,
            rsi_overbought: 1.0,
        }
    }
}

/// Strategy-wide configuration, parsed out of the YAML `strategies.<name>`
/// parameter bag (spec §6) rather than the teacher's TOML strategy file.
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    pub primary_symbol: String,
    pub timeframe_minutes: i64,
    pub history_length: usize,
    pub momentum_lookback: usize,
    pub volatility_lookback: usize,
    pub trend_strength_threshold: f64,
    pub rsi_buy_threshold: f64,
    pub rsi_sell_threshold: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub weights: ScoringWeights,
}

impl FunnelConfig {
    pub fn from_params(params: &StrategyParams) -> Self {
        Self {
            primary_symbol: params.string("primary_symbol", "BTC/USD"),
            timeframe_minutes: params.usize("timeframe_minutes", 60) as i64,
            history_length: params.usize("history_length", 250),
            momentum_lookback: params.usize("momentum_lookback", 120),
            volatility_lookback: params.usize("volatility_lookback", 48),
            trend_strength_threshold: params.f64("trend_strength_threshold", 20.0),
            rsi_buy_threshold: params.f64("rsi_buy_threshold", 30.0),
            rsi_sell_threshold: params.f64("rsi_sell_threshold", 70.0),
            buy_threshold: params.f64("buy_threshold", 5.0),
            sell_threshold: params.f64("sell_threshold", 5.0),
            weights: ScoringWeights {
                regime_bull: params.f64("weight_regime_bull", 3.0),
                regime_neutral: params.f64("weight_regime_neutral", 0.0),
                regime_bear: params.f64("weight_regime_bear", -5.0),
                momentum_bull: params.f64("weight_momentum_bull", 3.0),
                momentum_bear: params.f64("weight_momentum_bear", -3.0),
                volatility_low: params.f64("weight_volatility_low", 1.0),
                volatility_high: params.f64("weight_volatility_high", -5.0),
                rsi_oversold: params.f64("weight_rsi_oversold", 1.0),
                rsi_overbought: params.f64("weight_rsi_overbought", 1.0),
            },
        }
    }
}
