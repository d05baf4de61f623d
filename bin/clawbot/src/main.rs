use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use common::{Config, ExchangeClient, KvStore, MetricsRegistry, MetricsServer, RedisKv};
use engine::{BookConnector, Bus, Dispatcher, LiveExecution, RestBackfill, SimulatedExecution};
use portfolio::{PanicWatcher, Portfolio};
use risk::{RiskConfig, RiskManager};
use strategy::{Funnel, FunnelConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let cfg = Config::load(&config_path);
    info!(active_strategy = %cfg.active_strategy, "ClawBot starting");

    let metrics = Arc::new(
        MetricsRegistry::new().unwrap_or_else(|e| panic!("failed to init metrics registry: {e}")),
    );

    let kv: Option<Arc<dyn KvStore>> = match RedisKv::connect(&cfg.kv_url).await {
        Ok(kv) => Some(Arc::new(kv)),
        Err(e) => {
            error!(error = %e, "KV store unreachable at startup, continuing in degraded mode");
            None
        }
    };

    let (bus, bus_handle) = Bus::new(cfg.bus_capacity);

    // ── Strategy funnel ───────────────────────────────────────────────────
    let strategy_params = cfg
        .strategies
        .get(&cfg.active_strategy)
        .cloned()
        .unwrap_or_default();
    let funnel_config = FunnelConfig::from_params(&strategy_params);
    let mut funnel = Funnel::new(funnel_config, kv.clone());

    let backfill = RestBackfill::new();
    if let Err(e) = funnel.warm_up(&backfill).await {
        error!(error = %e, "strategy warm-up failed, starting without historical candles");
        funnel.skip_warm_up();
    }

    // ── Risk + portfolio ──────────────────────────────────────────────────
    let risk_manager = RiskManager::new(RiskConfig::default());
    let portfolio = Portfolio::new(cfg.initial_capital, kv.clone(), Some(metrics.clone()));

    // ── Execution handler ─────────────────────────────────────────────────
    let exchange_client: Arc<dyn ExchangeClient> = if cfg.live_trading.simulated {
        info!("simulated execution mode");
        Arc::new(SimulatedExecution::new())
    } else {
        let venue = &cfg.live_trading.execution_exchange_id;
        info!(exchange = %venue, "live execution mode");
        let keys = cfg
            .live_trading
            .api_keys
            .get(venue)
            .unwrap_or_else(|| panic!("no api_keys entry for execution venue '{venue}'"));
        let live = LiveExecution::new(
            venue.clone(),
            keys.api_key.clone(),
            keys.secret.clone(),
            cfg.live_trading.is_testnet,
            cfg.live_trading.symbol_translation.clone(),
        );
        live.connect()
            .await
            .unwrap_or_else(|e| panic!("failed to connect live execution handler: {e}"));
        Arc::new(live)
    };

    let dispatcher = Dispatcher::new(
        bus,
        bus_handle.clone(),
        funnel,
        risk_manager,
        portfolio,
        exchange_client,
        Some(metrics.clone()),
    );

    // ── Panic watcher ─────────────────────────────────────────────────────
    let panic_bus = bus_handle.clone();
    let panic_watcher = PanicWatcher::new(cfg.panic_file_path.clone(), move |event| {
        let bus = panic_bus.clone();
        Box::pin(async move { bus.enqueue(event).await })
    });
    tokio::spawn(panic_watcher.run());

    // ── Book connectors, one per configured venue ────────────────────────
    for (venue, exchange_cfg) in &cfg.data_acquisition.exchanges {
        let url = match Url::parse(&exchange_cfg.ws_url) {
            Ok(u) => u,
            Err(e) => {
                error!(venue, error = %e, "invalid ws_url, skipping connector");
                continue;
            }
        };
        let connector =
            BookConnector::new(venue.clone(), url, bus_handle.clone()).with_metrics(metrics.clone());
        tokio::spawn(connector.run());
    }

    // ── Metrics server ────────────────────────────────────────────────────
    let metrics_addr: SocketAddr = ([0, 0, 0, 0], cfg.metrics_port).into();
    let metrics_server = MetricsServer::new(metrics_addr, metrics.clone());
    tokio::spawn(async move {
        if let Err(e) = metrics_server.serve().await {
            error!(error = %e, "metrics server exited");
        }
    });

    // ── Dashboard API ─────────────────────────────────────────────────────
    if let Some(kv) = kv.clone() {
        let api_state = api::AppState {
            kv,
            dashboard_token: cfg.dashboard_token.clone(),
        };
        let port = cfg.dashboard_port;
        tokio::spawn(api::serve(api_state, port));
    } else {
        warn!("no KV store configured, dashboard API not started");
    }

    tokio::spawn(dispatcher.run());

    info!("all subsystems started, waiting for shutdown signal");
    tokio::signal::ctrl_c().await.unwrap();
    info!("shutdown signal received, exiting");
}
