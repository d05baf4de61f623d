use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use common::{Error, ExchangeClient, FillEvent, OrderEvent, Result};

const SLIPPAGE_RATE: f64 = 0.0005;
const COMMISSION_RATE: f64 = 0.001;

/// Paper-trading fill simulation (spec §4.6). Applies slippage adverse to the
/// order's direction and a flat commission rate, and propagates the order's
/// SL/TP onto the resulting fill untouched.
pub struct SimulatedExecution;

impl SimulatedExecution {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimulatedExecution {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for SimulatedExecution {
    async fn submit_order(&self, order: &OrderEvent, last_price: f64) -> Result<FillEvent> {
        if last_price <= 0.0 {
            return Err(Error::OrderRejected(format!(
                "no market price available for {}",
                order.symbol
            )));
        }

        let slippage = last_price * SLIPPAGE_RATE;
        let fill_price = match order.side {
            common::Side::Buy => last_price + slippage,
            common::Side::Sell => last_price - slippage,
        };
        let commission = order.quantity * fill_price * COMMISSION_RATE;

        info!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            fill_price,
            "simulated fill"
        );

        Ok(FillEvent {
            timestamp: Utc::now(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: fill_price,
            commission,
            exchange: "SIMULATED".to_string(),
            stop_loss_price: order.stop_loss_price,
            take_profit_price: order.take_profit_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Side;

    #[tokio::test]
    async fn buy_fill_has_adverse_slippage_and_commission() {
        let exec = SimulatedExecution::new();
        let order = OrderEvent::market("BTC/USD", Side::Buy, 2.0);
        let fill = exec.submit_order(&order, 100.0).await.unwrap();

        assert!((fill.price - 100.05).abs() < 1e-9);
        assert!((fill.commission - 2.0 * 100.05 * 0.001).abs() < 1e-9);
        assert_eq!(fill.side, Side::Buy);
        assert_eq!(fill.quantity, 2.0);
    }

    #[tokio::test]
    async fn sell_fill_slippage_is_adverse_in_the_other_direction() {
        let exec = SimulatedExecution::new();
        let order = OrderEvent::market("BTC/USD", Side::Sell, 1.0);
        let fill = exec.submit_order(&order, 100.0).await.unwrap();

        assert!((fill.price - 99.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn sl_tp_propagate_from_order_to_fill() {
        let exec = SimulatedExecution::new();
        let mut order = OrderEvent::market("BTC/USD", Side::Buy, 1.0);
        order.stop_loss_price = 94.0;
        order.take_profit_price = 109.0;

        let fill = exec.submit_order(&order, 100.0).await.unwrap();
        assert_eq!(fill.stop_loss_price, 94.0);
        assert_eq!(fill.take_profit_price, 109.0);
    }

    #[tokio::test]
    async fn zero_market_price_is_rejected() {
        let exec = SimulatedExecution::new();
        let order = OrderEvent::market("BTC/USD", Side::Buy, 1.0);
        assert!(exec.submit_order(&order, 0.0).await.is_err());
    }
}
