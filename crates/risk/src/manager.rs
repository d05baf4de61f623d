use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::{Direction, OrderEvent, RejectionReason, Side, SignalEvent};
use portfolio::PortfolioView;

/// User-configurable risk parameters (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fraction of `total_value` risked on a single trade.
    pub risk_per_trade_pct: f64,
    /// Multiplier applied to the ATR proxy to derive stop distance.
    pub stop_multiplier: f64,
    /// Reward-to-risk ratio used to place the take-profit.
    pub risk_reward_ratio: f64,
    /// ATR proxy as a fraction of `last_price`. Spec §9 flags this 3%
    /// placeholder for replacement by the real ATR once the feature
    /// pipeline's indicator value is threaded through.
    pub atr_proxy_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: 0.01,
            stop_multiplier: 2.0,
            risk_reward_ratio: 1.5,
            atr_proxy_pct: 0.03,
        }
    }
}

/// Sizes signals into orders and watches open positions for SL/TP exits.
///
/// A plain struct rather than a task with its own channels: the dispatcher
/// calls `on_signal`/`check_exits` synchronously and re-enqueues whatever
/// order comes back, per the single-writer model of spec §4.1/§5. No
/// strategy or executor holds a reference to this type or to the bus other
/// than through the dispatcher.
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Size a signal into an order per spec §4.5 steps 1–7. Rejections are
    /// returned rather than silently dropped so the dispatcher can log them
    /// with a specific reason.
    ///
    /// `atr_override` is the strategy funnel's latest real ATR-14 for this
    /// symbol, when available (spec §9 Open Question). A present, positive
    /// value is used in place of the `atr_proxy_pct` placeholder.
    pub fn on_signal(
        &self,
        signal: &SignalEvent,
        portfolio: &PortfolioView<'_>,
        atr_override: Option<f64>,
    ) -> Result<OrderEvent, RejectionReason> {
        if portfolio.is_panic_mode() {
            return Err(RejectionReason::PanicMode);
        }

        let last_price = portfolio.last_price(&signal.symbol);
        if last_price <= 0.0 {
            return Err(RejectionReason::NoMarketPrice);
        }

        let atr_proxy = match atr_override {
            Some(atr) if atr > 0.0 => atr,
            _ => last_price * self.config.atr_proxy_pct,
        };
        let risk_abs = portfolio.total_value() * self.config.risk_per_trade_pct;
        let stop_distance = self.config.stop_multiplier * atr_proxy;
        if stop_distance <= 0.0 {
            return Err(RejectionReason::NonPositiveSizing);
        }

        let quantity = risk_abs / stop_distance;
        if quantity <= 0.0 {
            return Err(RejectionReason::NonPositiveSizing);
        }

        let (stop_loss_price, take_profit_price) = match signal.direction {
            Direction::Long => (
                last_price - stop_distance,
                last_price + stop_distance * self.config.risk_reward_ratio,
            ),
            Direction::Short => (
                last_price + stop_distance,
                last_price - stop_distance * self.config.risk_reward_ratio,
            ),
        };

        let mut order = OrderEvent::market(
            signal.symbol.clone(),
            signal.direction.opening_side(),
            quantity,
        );
        order.stop_loss_price = stop_loss_price;
        order.take_profit_price = take_profit_price;

        info!(
            symbol = %signal.symbol,
            quantity,
            stop_loss_price,
            take_profit_price,
            "signal sized into order"
        );
        Ok(order)
    }

    /// Watch the symbol's open position (if any) for a stop-loss or
    /// take-profit breach at the latest tick. Reads a snapshot view rather
    /// than a live reference so a fill landing between ticks can't be
    /// observed half-applied (spec §4.5).
    pub fn check_exits(
        &self,
        symbol: &str,
        current_price: f64,
        portfolio: &PortfolioView<'_>,
    ) -> Option<OrderEvent> {
        let pos = portfolio.position(symbol)?;

        let triggered = match pos.side {
            Side::Buy => {
                current_price <= pos.stop_loss_price
                    || (pos.take_profit_price > 0.0 && current_price >= pos.take_profit_price)
            }
            Side::Sell => {
                current_price >= pos.stop_loss_price
                    || (pos.take_profit_price > 0.0 && current_price <= pos.take_profit_price)
            }
        };

        if !triggered {
            return None;
        }

        warn!(symbol, current_price, side = %pos.side, "SL/TP triggered, closing position");
        Some(OrderEvent::market(
            pos.symbol.clone(),
            pos.side.opposite(),
            pos.quantity.abs(),
        ))
    }
}
