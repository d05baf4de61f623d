use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use common::{
    AnalysisSnapshot, AnalysisStage, Candle, Direction, KvStore, MarketEvent, Result,
    SignalEvent,
};

use crate::candles::{CandleAssembler, TickOutcome};
use crate::config::FunnelConfig;
use crate::features::{compute_feature_rows, FeatureRow};
use crate::inference::{
    standardize, Inferer, MomentumClassifier, RegimeClassifier, RegimeLabel, VolatilityClassifier,
};

const KEY_LATEST_ANALYSIS: &str = "bot:latest_analysis";

/// One-shot historical candle fetch used to warm up the assembler (spec §6).
/// The final, incomplete candle must already be excluded by the implementation.
#[async_trait]
pub trait BackfillSource: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe_minutes: i64,
        limit: usize,
    ) -> Result<Vec<Candle>>;
}

struct Models {
    regime: RegimeClassifier,
    momentum: MomentumClassifier,
    volatility: VolatilityClassifier,
}

/// The multi-model decision funnel (spec §4.4): candle assembly, the
/// deterministic indicator pipeline, the three classifier stand-ins, and the
/// weighted scoring rule, all behind one `on_market` entry point the
/// dispatcher calls once per MARKET event.
pub struct Funnel {
    config: FunnelConfig,
    assembler: CandleAssembler,
    models: Models,
    ready: bool,
    kv: Option<Arc<dyn KvStore>>,
    last_atr_14: Option<f64>,
}

impl Funnel {
    pub fn new(config: FunnelConfig, kv: Option<Arc<dyn KvStore>>) -> Self {
        let period = ChronoDuration::minutes(config.timeframe_minutes);
        let history_length = config.history_length;
        let models = Models {
            regime: RegimeClassifier::new(config.trend_strength_threshold),
            momentum: MomentumClassifier::new(config.momentum_lookback),
            volatility: VolatilityClassifier::new(config.volatility_lookback),
        };
        Self {
            config,
            assembler: CandleAssembler::new(period, history_length),
            models,
            ready: false,
            kv,
            last_atr_14: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Most recently computed ATR-14 for `symbol`, if this funnel tracks it
    /// (spec §9 Open Question: the risk manager prefers this over its 3%
    /// placeholder once available). `None` until the first completed bucket
    /// has run inference, or if `symbol` isn't this funnel's primary symbol.
    pub fn latest_atr(&self, symbol: &str) -> Option<f64> {
        if symbol != self.config.primary_symbol {
            return None;
        }
        self.last_atr_14
    }

    /// Fetch and insert `history_length` candles from `source`. Until this
    /// completes the funnel stays `NOT_READY` and silently consumes market
    /// events (spec §4.3). A missing backfill source is a fatal
    /// configuration error per spec §7 — callers must not start the
    /// dispatcher without either this or `skip_warm_up`.
    pub async fn warm_up(&mut self, source: &dyn BackfillSource) -> Result<()> {
        let candles = source
            .fetch_candles(
                &self.config.primary_symbol,
                self.config.timeframe_minutes,
                self.config.history_length,
            )
            .await?;
        info!(count = candles.len(), "backfill candles received");
        self.assembler.warm_up(candles);
        self.ready = true;
        info!("strategy ready to receive live data");
        Ok(())
    }

    /// Mark the funnel ready without a backfill source — used in tests and
    /// when no backfill connector is configured (the original logs a
    /// warning and proceeds directly to live data).
    pub fn skip_warm_up(&mut self) {
        warn!("no backfill source configured, starting without historical candles");
        self.ready = true;
    }

    /// Consume one MARKET event restricted to the funnel's primary symbol
    /// (spec §4.3). Returns a signal only on the first event of a newly
    /// completed candle bucket, after running the indicator pipeline and
    /// the three-model scoring funnel off the dispatcher thread.
    pub async fn on_market(&mut self, event: &MarketEvent) -> Option<SignalEvent> {
        if !self.ready || event.symbol != self.config.primary_symbol {
            return None;
        }
        if !event.is_valid() {
            return None;
        }

        let mid = event.mid();
        if self.assembler.on_tick(event.timestamp, mid) != TickOutcome::NewBucket {
            return None;
        }

        if self.assembler.len() < self.config.history_length {
            return None;
        }

        let candles: Vec<Candle> = self.assembler.history().iter().copied().collect();
        let regime = self.models.regime.clone();
        let momentum = self.models.momentum.clone();
        let volatility = self.models.volatility.clone();
        let momentum_lookback = self.config.momentum_lookback;
        let volatility_lookback = self.config.volatility_lookback;

        let result = match tokio::task::spawn_blocking(move || {
            run_inference(&candles, &regime, &momentum, &volatility, momentum_lookback, volatility_lookback)
        })
        .await
        {
            Ok(Some(r)) => r,
            Ok(None) => return None,
            Err(e) => {
                error!(error = %e, "inference worker panicked");
                return None;
            }
        };

        self.last_atr_14 = Some(result.atr_14);

        let symbol = event.symbol.clone();
        let timestamp = Utc::now();
        self.decide(&symbol, timestamp, result).await
    }

    async fn decide(
        &self,
        symbol: &str,
        timestamp: DateTime<Utc>,
        result: InferenceResult,
    ) -> Option<SignalEvent> {
        let w = &self.config.weights;
        let mut buy_score = 0.0;
        let mut sell_score = 0.0;

        let buy_regime_pass;
        if result.regime.is_bullish() {
            buy_score += w.regime_bull;
            buy_regime_pass = true;
        } else if result.regime.is_bearish() {
            // §4.4's "bear regime ... scoring positively toward sell": the
            // configured weight is a negative magnitude (carried over from
            // the original's scoring config), so it is negated here rather
            // than added as-is, which would instead suppress SHORT signals.
            sell_score += -w.regime_bear;
            buy_regime_pass = false;
        } else {
            buy_score += w.regime_neutral;
            sell_score += w.regime_neutral;
            buy_regime_pass = false;
        }

        let buy_momentum_pass = result.momentum_bullish;
        if result.momentum_bullish {
            buy_score += w.momentum_bull;
        } else {
            sell_score += -w.momentum_bear;
        }

        let buy_volatility_pass = !result.volatility_high;
        if result.volatility_high {
            buy_score += w.volatility_high;
            sell_score += w.volatility_high;
        } else {
            buy_score += w.volatility_low;
            sell_score += w.volatility_low;
        }

        let buy_rsi_pass = result.rsi < self.config.rsi_buy_threshold;
        if buy_rsi_pass {
            buy_score += w.rsi_oversold;
        }
        if result.rsi > self.config.rsi_sell_threshold {
            sell_score += w.rsi_overbought;
        }

        info!(buy_score, sell_score, symbol, "funnel scores computed");

        let (direction, final_decision) = if buy_score >= self.config.buy_threshold {
            (Some(Direction::Long), AnalysisSnapshot::BUY)
        } else if sell_score >= self.config.sell_threshold {
            (Some(Direction::Short), AnalysisSnapshot::SELL)
        } else {
            (None, AnalysisSnapshot::NO_SIGNAL)
        };

        let snapshot = AnalysisSnapshot {
            regime: AnalysisStage {
                value: json!(result.regime.to_string()),
                pass: buy_regime_pass,
            },
            momentum: AnalysisStage {
                value: json!(if result.momentum_bullish {
                    "Momentum Haussier"
                } else {
                    "Momentum Baissier"
                }),
                pass: buy_momentum_pass,
            },
            volatility: AnalysisStage {
                value: json!(if result.volatility_high {
                    "Haute Volatilité"
                } else {
                    "Basse Volatilité"
                }),
                pass: buy_volatility_pass,
            },
            rsi: AnalysisStage {
                value: json!(result.rsi),
                pass: buy_rsi_pass,
            },
            final_decision: final_decision.to_string(),
        };
        self.publish_analysis(&snapshot).await;

        direction.map(|direction| {
            warn!(symbol, ?direction, "signal emitted");
            SignalEvent {
                timestamp,
                symbol: symbol.to_string(),
                direction,
                strength: None,
            }
        })
    }

    async fn publish_analysis(&self, snapshot: &AnalysisSnapshot) {
        let Some(kv) = &self.kv else { return };
        match serde_json::to_string(snapshot) {
            Ok(json) => {
                if let Err(e) = kv.set(KEY_LATEST_ANALYSIS, &json).await {
                    error!(error = %e, "failed to publish analysis snapshot, continuing in degraded mode");
                }
            }
            Err(e) => error!(error = %e, "failed to serialize analysis snapshot"),
        }
    }
}

struct InferenceResult {
    regime: RegimeLabel,
    momentum_bullish: bool,
    volatility_high: bool,
    rsi: f64,
    atr_14: f64,
}

fn run_inference(
    candles: &[Candle],
    regime: &RegimeClassifier,
    momentum: &MomentumClassifier,
    volatility: &VolatilityClassifier,
    momentum_lookback: usize,
    volatility_lookback: usize,
) -> Option<InferenceResult> {
    let rows = compute_feature_rows(candles);
    if rows.is_empty() {
        return None;
    }
    let latest: &FeatureRow = rows.last().unwrap();
    let regime_label = regime.classify(latest);

    if rows.len() < momentum_lookback || rows.len() < volatility_lookback {
        return None;
    }

    let momentum_rows: Vec<Vec<f64>> =
        rows[rows.len() - momentum_lookback..].iter().map(FeatureRow::as_vector).collect();
    let momentum_raw = momentum.predict_sequence(&standardize(&momentum_rows));

    let volatility_rows: Vec<Vec<f64>> =
        rows[rows.len() - volatility_lookback..].iter().map(FeatureRow::as_vector).collect();
    let volatility_raw = volatility.predict_sequence(&standardize(&volatility_rows));

    Some(InferenceResult {
        regime: regime_label,
        momentum_bullish: momentum_raw > 0.5,
        volatility_high: volatility_raw > 0.5,
        rsi: latest.rsi_14,
        atr_14: latest.atr_14,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringWeights;

    fn test_config() -> FunnelConfig {
        FunnelConfig {
            primary_symbol: "BTC/USD".to_string(),
            timeframe_minutes: 60,
            history_length: 250,
            momentum_lookback: 120,
            volatility_lookback: 48,
            trend_strength_threshold: 20.0,
            rsi_buy_threshold: 30.0,
            rsi_sell_threshold: 70.0,
            buy_threshold: 5.0,
            sell_threshold: 5.0,
            weights: ScoringWeights::default(),
        }
    }

    fn funnel() -> Funnel {
        Funnel::new(test_config(), None)
    }

    #[tokio::test]
    async fn bullish_regime_and_momentum_emit_long() {
        let f = funnel();
        let result = InferenceResult {
            regime: RegimeLabel::BullMarket2021,
            momentum_bullish: true,
            volatility_high: false,
            rsi: 50.0,
            atr_14: 3.0,
        };
        // buy_score = regime_bull(3) + momentum_bull(3) + volatility_low(1) = 7 >= 5.
        let signal = f.decide("BTC/USD", Utc::now(), result).await.unwrap();
        assert_eq!(signal.direction, Direction::Long);
    }

    #[tokio::test]
    async fn bearish_regime_and_momentum_emit_short() {
        let f = funnel();
        let result = InferenceResult {
            regime: RegimeLabel::BearMarket2022,
            momentum_bullish: false,
            volatility_high: false,
            rsi: 50.0,
            atr_14: 3.0,
        };
        // sell_score = -regime_bear(5) + -momentum_bear(3) + volatility_low(1) = 9 >= 5.
        let signal = f.decide("BTC/USD", Utc::now(), result).await.unwrap();
        assert_eq!(signal.direction, Direction::Short);
    }

    #[tokio::test]
    async fn neutral_regime_below_threshold_emits_no_signal() {
        let f = funnel();
        let result = InferenceResult {
            regime: RegimeLabel::Neutral,
            momentum_bullish: false,
            volatility_high: true,
            rsi: 50.0,
            atr_14: 3.0,
        };
        // buy_score = regime_neutral(0) + volatility_high(-5) = -5; sell_score
        // = regime_neutral(0) + -momentum_bear(3) + volatility_high(-5) = -2.
        let signal = f.decide("BTC/USD", Utc::now(), result).await;
        assert!(signal.is_none());
    }

    #[tokio::test]
    async fn rsi_oversold_contributes_to_buy_score() {
        let f = funnel();
        let result = InferenceResult {
            regime: RegimeLabel::Neutral,
            momentum_bullish: true,
            volatility_high: false,
            rsi: 20.0,
            atr_14: 3.0,
        };
        // buy_score = regime_neutral(0) + momentum_bull(3) + volatility_low(1)
        // + rsi_oversold(1) = 5 >= 5.
        let signal = f.decide("BTC/USD", Utc::now(), result).await.unwrap();
        assert_eq!(signal.direction, Direction::Long);
    }
}
