use std::sync::Arc;

use tracing::{error, info, warn};

use common::{EngineEvent, ExchangeClient, FillEvent, MetricsRegistry, OrderEvent, SignalEvent};
use portfolio::Portfolio;
use risk::RiskManager;
use strategy::Funnel;

use crate::bus::{Bus, BusHandle};

/// The single writer of portfolio state (spec §4.1/§5). Owns the bus
/// receiver, the funnel, the risk manager, the portfolio, and the exchange
/// handle; every other task only ever produces events onto a `BusHandle`.
///
/// Events derived from handling another event (a MARKET tick producing a
/// SIGNAL, a SIGNAL sizing into an ORDER, an ORDER filling) are processed
/// inline rather than re-enqueued — re-enqueueing onto a bus this loop alone
/// drains would deadlock the moment the bus filled up while this task waited
/// on its own send. The `EngineEvent` tag still exists for every stage so
/// tests and other producers can inject a `Signal`/`Order`/`Fill` directly
/// and see it handled identically.
pub struct Dispatcher {
    bus: Bus,
    bus_handle: BusHandle,
    funnel: Funnel,
    risk: RiskManager,
    portfolio: Portfolio,
    exchange: Arc<dyn ExchangeClient>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Dispatcher {
    pub fn new(
        bus: Bus,
        bus_handle: BusHandle,
        funnel: Funnel,
        risk: RiskManager,
        portfolio: Portfolio,
        exchange: Arc<dyn ExchangeClient>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            bus,
            bus_handle,
            funnel,
            risk,
            portfolio,
            exchange,
            metrics,
        }
    }

    /// Handle to enqueue onto this dispatcher's bus, e.g. for a
    /// `PanicWatcher` constructed before the dispatcher is moved into its run
    /// task.
    pub fn bus_handle(&self) -> BusHandle {
        self.bus_handle.clone()
    }

    /// Drain the bus forever, dispatching every event by variant. Returns
    /// only once every producer handle has been dropped and the bus is
    /// drained — in practice, never, since connectors and the panic watcher
    /// run for the process lifetime.
    pub async fn run(mut self) {
        info!("dispatcher started");
        while let Some(event) = self.bus.recv().await {
            if let Some(metrics) = &self.metrics {
                metrics.bus_depth.set(self.bus_handle.depth());
            }
            self.handle_event(event).await;
        }
        warn!("dispatcher stopped: bus closed");
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Market(market) => {
                let signal = self.funnel.on_market(&market).await;

                self.portfolio.mark_to_market(&market.symbol, market.mid()).await;

                if let Some(order) =
                    self.risk.check_exits(&market.symbol, market.mid(), &self.portfolio.view())
                {
                    self.handle_order(order).await;
                }

                if let Some(signal) = signal {
                    self.handle_signal(signal).await;
                }
            }
            EngineEvent::Signal(signal) => self.handle_signal(signal).await,
            EngineEvent::Order(order) => self.handle_order(order).await,
            EngineEvent::Fill(fill) => self.handle_fill(fill).await,
            EngineEvent::Panic => self.handle_panic().await,
        }
    }

    async fn handle_signal(&mut self, signal: SignalEvent) {
        let atr_override = self.funnel.latest_atr(&signal.symbol);
        match self.risk.on_signal(&signal, &self.portfolio.view(), atr_override) {
            Ok(order) => self.handle_order(order).await,
            Err(reason) => {
                warn!(symbol = %signal.symbol, %reason, "signal rejected by risk manager");
            }
        }
    }

    async fn handle_order(&mut self, order: OrderEvent) {
        let last_price = self.portfolio.view().last_price(&order.symbol);
        match self.exchange.submit_order(&order, last_price).await {
            Ok(fill) => self.handle_fill(fill).await,
            Err(e) => {
                error!(symbol = %order.symbol, error = %e, "order submission failed, no fill");
            }
        }
    }

    async fn handle_fill(&mut self, fill: FillEvent) {
        self.portfolio.on_fill(&fill).await;
    }

    async fn handle_panic(&mut self) {
        warn!("panic event received, liquidating all open positions");
        for order in self.portfolio.activate_panic() {
            self.handle_order(order).await;
        }
    }
}
