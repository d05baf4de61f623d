use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use common::{
    ClosedTrade, FillEvent, KvStore, MetricsRegistry, OrderEvent, Position,
    PortfolioHistorySnapshot, PortfolioStateSnapshot, Side, TradingStats,
};

const HISTORY_CAPACITY: usize = 300;
const HISTORY_MIN_SPACING_SECS: i64 = 5;

const KEY_STATE: &str = "bot:portfolio:state";
const KEY_HISTORY: &str = "bot:portfolio:history";
const KEY_TRADE_HISTORY: &str = "bot:trade_history";
const KEY_STATS: &str = "bot:stats";

/// Authoritative cash/positions/history (spec §4.7). Touched by exactly one
/// writer — the dispatcher — per the single-writer discipline of §5.
/// Read-only collaborators (risk manager) see it only through `PortfolioView`.
pub struct Portfolio {
    initial_capital: f64,
    cash: f64,
    positions: HashMap<String, Position>,
    last_known_prices: HashMap<String, f64>,
    is_panic_mode: bool,

    total_trades: u64,
    winning_trades: u64,
    total_profit: f64,
    total_loss: f64,
    holding_times_hours: Vec<f64>,
    closed_trades: Vec<ClosedTrade>,

    history: PortfolioHistorySnapshot,
    last_history_append: Option<DateTime<Utc>>,

    kv: Option<Arc<dyn KvStore>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Portfolio {
    pub fn new(
        initial_capital: f64,
        kv: Option<Arc<dyn KvStore>>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: HashMap::new(),
            last_known_prices: HashMap::new(),
            is_panic_mode: false,
            total_trades: 0,
            winning_trades: 0,
            total_profit: 0.0,
            total_loss: 0.0,
            holding_times_hours: Vec::new(),
            closed_trades: Vec::new(),
            history: PortfolioHistorySnapshot::default(),
            last_history_append: None,
            kv,
            metrics,
        }
    }

    pub fn view(&self) -> PortfolioView<'_> {
        PortfolioView { portfolio: self }
    }

    pub fn is_panic_mode(&self) -> bool {
        self.is_panic_mode
    }

    /// Apply a fill to cash/positions per spec §4.7's closing/opening rules,
    /// then mark-to-market and republish stats.
    pub async fn on_fill(&mut self, fill: &FillEvent) {
        if let Some(metrics) = &self.metrics {
            metrics
                .trades_executed
                .with_label_values(&[&fill.exchange, &fill.symbol, &fill.side.to_string()])
                .inc();
        }

        self.cash -= fill.commission;

        let existing = self.positions.get(&fill.symbol).cloned();
        match existing {
            Some(pos) if pos.side != fill.side => {
                // Closing fill: opposite side to the open position.
                let pnl = match pos.side {
                    Side::Buy => (fill.price - pos.entry_price) * pos.quantity,
                    Side::Sell => (pos.entry_price - fill.price) * pos.quantity,
                };

                self.total_trades += 1;
                if pnl >= 0.0 {
                    self.winning_trades += 1;
                    self.total_profit += pnl;
                } else {
                    self.total_loss += pnl.abs();
                }

                self.cash += pos.entry_price * pos.quantity + pnl;

                let now = Utc::now();
                let holding_hours = (now - pos.entry_timestamp).num_seconds() as f64 / 3600.0;
                self.holding_times_hours.push(holding_hours);

                self.closed_trades.push(ClosedTrade {
                    symbol: pos.symbol.clone(),
                    side: pos.side,
                    entry_price: pos.entry_price,
                    exit_price: fill.price,
                    quantity: pos.quantity,
                    pnl,
                    commission: fill.commission,
                    opened_at: pos.entry_timestamp,
                    closed_at: now,
                });

                info!(symbol = %fill.symbol, pnl, "position closed");
                self.positions.remove(&fill.symbol);
            }
            _ => {
                // Opening fill: no existing position, or same-direction fill
                // treated as a fresh open (spec §9: short-sale cash resolved
                // as `cash += qty*price`).
                match fill.side {
                    Side::Buy => self.cash -= fill.quantity * fill.price,
                    Side::Sell => self.cash += fill.quantity * fill.price,
                }
                self.positions.insert(
                    fill.symbol.clone(),
                    Position {
                        symbol: fill.symbol.clone(),
                        side: fill.side,
                        quantity: fill.quantity,
                        entry_price: fill.price,
                        stop_loss_price: fill.stop_loss_price,
                        take_profit_price: fill.take_profit_price,
                        entry_timestamp: Utc::now(),
                    },
                );
                info!(symbol = %fill.symbol, side = %fill.side, qty = fill.quantity, price = fill.price, "position opened");
            }
        }

        self.mark_to_market(&fill.symbol, fill.price).await;
        self.publish_stats().await;
    }

    /// Merge a fresh price, recompute `total_value`, append to the ring
    /// history if ≥5s have elapsed since the last point, and publish.
    pub async fn mark_to_market(&mut self, symbol: &str, price: f64) {
        self.last_known_prices.insert(symbol.to_string(), price);

        let holdings: f64 = self
            .positions
            .values()
            .map(|p| {
                let last = self
                    .last_known_prices
                    .get(&p.symbol)
                    .copied()
                    .unwrap_or(p.entry_price);
                p.quantity * last
            })
            .sum();
        let total_value = self.cash + holdings;

        if let Some(metrics) = &self.metrics {
            metrics.portfolio_value.set(total_value);
            metrics.open_positions.set(self.positions.len() as i64);
        }

        let now = Utc::now();
        let should_append = match self.last_history_append {
            None => true,
            Some(prev) => (now - prev).num_seconds() >= HISTORY_MIN_SPACING_SECS,
        };
        if should_append {
            self.history.labels.push(now.to_rfc3339());
            self.history.total_value.push(total_value);
            self.history.cash.push(self.cash);
            if self.history.labels.len() > HISTORY_CAPACITY {
                let excess = self.history.labels.len() - HISTORY_CAPACITY;
                self.history.labels.drain(0..excess);
                self.history.total_value.drain(0..excess);
                self.history.cash.drain(0..excess);
            }
            self.last_history_append = Some(now);
        }

        let pnl_value = total_value - self.initial_capital;
        let pnl_pct = if self.initial_capital > 0.0 {
            pnl_value / self.initial_capital * 100.0
        } else {
            0.0
        };
        let snapshot = PortfolioStateSnapshot {
            total_value,
            pnl_value,
            pnl_pct,
            cash: self.cash,
            positions: self.positions.values().cloned().collect(),
        };

        self.publish(KEY_STATE, &snapshot).await;
        self.publish(KEY_HISTORY, &self.history).await;
        self.publish(KEY_TRADE_HISTORY, &self.closed_trades).await;
    }

    async fn publish_stats(&self) {
        let win_rate = if self.total_trades > 0 {
            self.winning_trades as f64 / self.total_trades as f64 * 100.0
        } else {
            0.0
        };
        let profit_factor = (self.total_loss > 0.0).then(|| self.total_profit / self.total_loss);
        let avg_holding_time_hours = if !self.holding_times_hours.is_empty() {
            self.holding_times_hours.iter().sum::<f64>() / self.holding_times_hours.len() as f64
        } else {
            0.0
        };

        let stats = TradingStats {
            total_trades: self.total_trades,
            win_rate,
            profit_factor,
            avg_holding_time_hours,
        };
        self.publish(KEY_STATS, &stats).await;
    }

    async fn publish<T: serde::Serialize>(&self, key: &str, value: &T) {
        let Some(kv) = &self.kv else {
            return;
        };
        match serde_json::to_string(value) {
            Ok(json) => {
                if let Err(e) = kv.set(key, &json).await {
                    if let Some(metrics) = &self.metrics {
                        metrics.kv_writes_failure.inc();
                    }
                    error!(key, error = %e, "KV publish failed, continuing in degraded mode");
                } else if let Some(metrics) = &self.metrics {
                    metrics.kv_writes_success.inc();
                }
            }
            Err(e) => error!(key, error = %e, "failed to serialize snapshot"),
        }
    }

    /// Flip panic mode and return one closing MARKET order per open position,
    /// for the dispatcher to enqueue. New signals are ignored while the flag
    /// is set (enforced by the risk manager, not here).
    pub fn activate_panic(&mut self) -> Vec<OrderEvent> {
        self.is_panic_mode = true;

        if self.positions.is_empty() {
            info!("panic mode activated: no positions to liquidate");
            return Vec::new();
        }

        warn!(count = self.positions.len(), "panic mode activated: liquidating all positions");
        self.positions
            .values()
            .map(|pos| OrderEvent::market(pos.symbol.clone(), pos.side.opposite(), pos.quantity.abs()))
            .collect()
    }
}

/// Read-only capability handed to the risk manager. Breaks the cyclic
/// reference between portfolio and risk (spec §9): risk never mutates the
/// portfolio directly, it only reads through this view and emits orders onto
/// the bus.
pub struct PortfolioView<'a> {
    portfolio: &'a Portfolio,
}

impl<'a> PortfolioView<'a> {
    pub fn total_value(&self) -> f64 {
        let holdings: f64 = self
            .portfolio
            .positions
            .values()
            .map(|p| {
                let last = self
                    .portfolio
                    .last_known_prices
                    .get(&p.symbol)
                    .copied()
                    .unwrap_or(p.entry_price);
                p.quantity * last
            })
            .sum();
        self.portfolio.cash + holdings
    }

    pub fn last_price(&self, symbol: &str) -> f64 {
        self.portfolio
            .last_known_prices
            .get(symbol)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_panic_mode(&self) -> bool {
        self.portfolio.is_panic_mode
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.portfolio.positions.get(symbol)
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.portfolio.positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Side;

    fn fill(symbol: &str, side: Side, quantity: f64, price: f64, commission: f64) -> FillEvent {
        FillEvent {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            commission,
            exchange: "TEST".to_string(),
            stop_loss_price: 0.0,
            take_profit_price: 0.0,
        }
    }

    #[tokio::test]
    async fn simulated_fill_pnl_matches_spec_scenario() {
        // §8 scenario 3: open BUY 1@100 (commission 0.1), close SELL 1@110
        // (commission 0.11) => pnl=10, cash=10009.79.
        let mut portfolio = Portfolio::new(10_000.0, None, None);
        portfolio
            .on_fill(&fill("BTC/USD", Side::Buy, 1.0, 100.0, 0.1))
            .await;
        portfolio
            .on_fill(&fill("BTC/USD", Side::Sell, 1.0, 110.0, 0.11))
            .await;

        assert!((portfolio.cash - 10_009.79).abs() < 1e-9);
        assert_eq!(portfolio.closed_trades.len(), 1);
        assert!((portfolio.closed_trades[0].pnl - 10.0).abs() < 1e-9);
        assert!(!portfolio.positions.contains_key("BTC/USD"));
    }

    #[tokio::test]
    async fn short_open_adds_proceeds_to_cash() {
        // §9 open question, resolved: opening SELL credits cash with qty*price.
        let mut portfolio = Portfolio::new(10_000.0, None, None);
        portfolio
            .on_fill(&fill("ETH/USD", Side::Sell, 2.0, 50.0, 0.0))
            .await;
        assert!((portfolio.cash - 10_100.0).abs() < 1e-9);
        assert_eq!(portfolio.positions.get("ETH/USD").unwrap().side, Side::Sell);
    }

    #[tokio::test]
    async fn at_most_one_position_per_symbol() {
        let mut portfolio = Portfolio::new(10_000.0, None, None);
        portfolio
            .on_fill(&fill("BTC/USD", Side::Buy, 1.0, 100.0, 0.0))
            .await;
        assert_eq!(portfolio.positions.len(), 1);
        portfolio
            .on_fill(&fill("BTC/USD", Side::Sell, 1.0, 105.0, 0.0))
            .await;
        assert!(portfolio.positions.is_empty());
    }

    #[tokio::test]
    async fn mark_to_market_total_value_matches_cash_plus_holdings() {
        let mut portfolio = Portfolio::new(10_000.0, None, None);
        portfolio
            .on_fill(&fill("BTC/USD", Side::Buy, 2.0, 100.0, 0.0))
            .await;
        portfolio.mark_to_market("BTC/USD", 120.0).await;

        let expected_cash = 10_000.0 - 200.0;
        let expected_total = expected_cash + 2.0 * 120.0;
        assert!((portfolio.cash - expected_cash).abs() < 1e-9);
        assert!((portfolio.view().total_value() - expected_total).abs() < 1e-9);
    }

    #[tokio::test]
    async fn history_ring_buffer_caps_at_300_and_respects_spacing() {
        let mut portfolio = Portfolio::new(10_000.0, None, None);
        portfolio.mark_to_market("BTC/USD", 100.0).await;
        let first_len = portfolio.history.labels.len();
        assert_eq!(first_len, 1);

        // A second call inside the 5s window must not append again.
        portfolio.mark_to_market("BTC/USD", 101.0).await;
        assert_eq!(portfolio.history.labels.len(), 1);
    }

    #[test]
    fn activate_panic_emits_one_closing_order_per_open_position() {
        // §8 scenario 5: A (BUY 1) and B (SELL 2) => closing SELL 1 / BUY 2.
        let mut portfolio = Portfolio::new(10_000.0, None, None);
        portfolio.positions.insert(
            "A/USD".to_string(),
            Position {
                symbol: "A/USD".to_string(),
                side: Side::Buy,
                quantity: 1.0,
                entry_price: 10.0,
                stop_loss_price: 0.0,
                take_profit_price: 0.0,
                entry_timestamp: Utc::now(),
            },
        );
        portfolio.positions.insert(
            "B/USD".to_string(),
            Position {
                symbol: "B/USD".to_string(),
                side: Side::Sell,
                quantity: 2.0,
                entry_price: 20.0,
                stop_loss_price: 0.0,
                take_profit_price: 0.0,
                entry_timestamp: Utc::now(),
            },
        );

        let orders = portfolio.activate_panic();
        assert!(portfolio.is_panic_mode());
        assert_eq!(orders.len(), 2);

        let a_order = orders.iter().find(|o| o.symbol == "A/USD").unwrap();
        assert_eq!(a_order.side, Side::Sell);
        assert!((a_order.quantity - 1.0).abs() < 1e-9);

        let b_order = orders.iter().find(|o| o.symbol == "B/USD").unwrap();
        assert_eq!(b_order.side, Side::Buy);
        assert!((b_order.quantity - 2.0).abs() < 1e-9);
    }

    #[test]
    fn activate_panic_with_no_positions_emits_nothing() {
        let mut portfolio = Portfolio::new(10_000.0, None, None);
        let orders = portfolio.activate_panic();
        assert!(orders.is_empty());
        assert!(portfolio.is_panic_mode());
    }
}
