//! Prometheus telemetry. Metric set and names follow spec §6's list exactly;
//! the registry/server shape is grounded on a Prometheus+hyper pattern found
//! elsewhere in the retrieved example pack (not in the teacher, which has no
//! telemetry of its own).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Counter, CounterVec, Encoder, Gauge, IntGauge, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Central registry for all telemetry named in spec §6.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    pub messages_processed: CounterVec,
    pub kv_writes_success: Counter,
    pub kv_writes_failure: Counter,
    pub bus_depth: IntGauge,
    pub portfolio_value: Gauge,
    pub open_positions: IntGauge,
    pub trades_executed: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let messages_processed = CounterVec::new(
            Opts::new(
                "messages_processed_total",
                "Total number of book frames processed by the data acquirer",
            ),
            &["exchange"],
        )?;
        registry.register(Box::new(messages_processed.clone()))?;

        let kv_writes_success = Counter::new(
            "kv_writes_success_total",
            "Total number of successful writes to the KV store",
        )?;
        registry.register(Box::new(kv_writes_success.clone()))?;

        let kv_writes_failure = Counter::new(
            "kv_writes_failure_total",
            "Total number of failed writes to the KV store",
        )?;
        registry.register(Box::new(kv_writes_failure.clone()))?;

        let bus_depth = IntGauge::new("bus_depth", "Current number of events queued on the bus")?;
        registry.register(Box::new(bus_depth.clone()))?;

        let portfolio_value =
            Gauge::new("portfolio_value_usd", "Current total portfolio value")?;
        registry.register(Box::new(portfolio_value.clone()))?;

        let open_positions =
            IntGauge::new("open_positions_total", "Current number of open positions")?;
        registry.register(Box::new(open_positions.clone()))?;

        let trades_executed = CounterVec::new(
            Opts::new("trades_executed_total", "Total number of trades executed"),
            &["exchange", "symbol", "side"],
        )?;
        registry.register(Box::new(trades_executed.clone()))?;

        info!("metrics registry initialized");

        Ok(Self {
            registry,
            messages_processed,
            kv_writes_success,
            kv_writes_failure,
            bus_depth,
            portfolio_value,
            open_positions,
            trades_executed,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Lightweight hyper server exposing `/metrics` and `/health`.
pub struct MetricsServer {
    listen_addr: SocketAddr,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    pub fn new(listen_addr: SocketAddr, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            listen_addr,
            registry,
        }
    }

    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .context("failed to bind metrics server")?;
        info!(addr = %self.listen_addr, "metrics server listening");

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "failed to accept metrics connection");
                    continue;
                }
            };

            let registry = self.registry.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let registry = registry.clone();
                    async move { handle_request(req, registry) }
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(%remote_addr, error = %err, "metrics connection closed");
                }
            });
        }
    }
}

fn handle_request(
    req: Request<hyper::body::Incoming>,
    registry: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path();

    if path == "/health" || path == "/healthz" {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("OK")))
            .unwrap());
    }

    if path == "/metrics" {
        let encoder = TextEncoder::new();
        let metric_families = registry.registry().gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!(error = %e, "failed to encode metrics");
            return Ok(Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(format!("error: {e}"))))
                .unwrap());
        }
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain; version=0.0.4")
            .body(Full::new(Bytes::from(buffer)))
            .unwrap());
    }

    warn!(path, "unknown metrics endpoint requested");
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::from("Not Found")))
        .unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exposes_every_metric_named_in_spec() {
        let registry = MetricsRegistry::new().unwrap();
        registry
            .messages_processed
            .with_label_values(&["binance"])
            .inc();
        registry.trades_executed.with_label_values(&["binance", "BTC/USD", "BUY"]).inc();
        registry.bus_depth.set(3);
        registry.portfolio_value.set(10_000.0);
        registry.open_positions.set(1);
        registry.kv_writes_success.inc();
        registry.kv_writes_failure.inc();

        let families = registry.registry().gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        for expected in [
            "messages_processed_total",
            "kv_writes_success_total",
            "kv_writes_failure_total",
            "bus_depth",
            "portfolio_value_usd",
            "open_positions_total",
            "trades_executed_total",
        ] {
            assert!(names.contains(&expected), "missing metric {expected}");
        }
    }
}
