use async_trait::async_trait;

use crate::{FillEvent, OrderEvent, Result};

/// Abstraction over placing an order at a venue.
///
/// `engine::execution::SimulatedExecution` implements this for paper trading,
/// `engine::execution::LiveExecution` for real order placement. Only
/// `engine::execution` holds a `dyn ExchangeClient` — all order flow reaches
/// it through the dispatcher after passing the risk manager.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Submit an order and return its fill confirmation. `last_price` is the
    /// most recent known mid-price for the order's symbol, supplied by the
    /// dispatcher from the portfolio's read-only view — simulated fills need
    /// it to derive slippage; live implementations may ignore it.
    async fn submit_order(&self, order: &OrderEvent, last_price: f64) -> Result<FillEvent>;
}
