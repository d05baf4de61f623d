use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use url::Url;

use common::{BookLevel, MarketEvent, MetricsRegistry};

use crate::bus::BusHandle;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Connector lifecycle, kept as explicit state (spec §4.2) rather than
/// implied by control flow so tests can assert transitions directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Disconnected,
    Connecting,
    Subscribed,
    Streaming,
}

/// WebSocket client subscribing to a depth-N book channel for one exchange's
/// configured symbols, translating `update` frames into `MarketEvent`s and
/// enqueueing them onto the bus. `snapshot` frames are ignored by the live
/// path per spec §4.2 — the strategy re-warms via its own backfill.
pub struct BookConnector {
    exchange: String,
    url: Url,
    bus: BusHandle,
    metrics: Option<std::sync::Arc<MetricsRegistry>>,
    state: ConnectorState,
}

impl BookConnector {
    pub fn new(exchange: impl Into<String>, url: Url, bus: BusHandle) -> Self {
        Self {
            exchange: exchange.into(),
            url,
            bus,
            metrics: None,
            state: ConnectorState::Disconnected,
        }
    }

    pub fn with_metrics(mut self, metrics: std::sync::Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    /// Run the connector forever. On any transport error or malformed frame
    /// that aborts the stream, sleep a fixed 5s and re-enter `Connecting` —
    /// reconnection is indefinite, with no retry budget (spec §4.2/§5).
    pub async fn run(mut self) {
        loop {
            self.state = ConnectorState::Connecting;
            info!(exchange = %self.exchange, url = %self.url, "connecting to book stream");

            match self.stream_once().await {
                Ok(()) => {
                    info!(exchange = %self.exchange, "book stream closed cleanly");
                }
                Err(e) => {
                    warn!(exchange = %self.exchange, error = %e, "book stream error, reconnecting");
                }
            }

            self.state = ConnectorState::Disconnected;
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn stream_once(&mut self) -> Result<(), String> {
        let (ws_stream, _) = connect_async(self.url.clone())
            .await
            .map_err(|e| e.to_string())?;
        self.state = ConnectorState::Subscribed;

        let (_, mut read) = ws_stream.split();
        self.state = ConnectorState::Streaming;

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| e.to_string())?;
            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_book_frame(&text) {
                    Ok(Some(event)) => {
                        if let Some(metrics) = &self.metrics {
                            metrics
                                .messages_processed
                                .with_label_values(&[&self.exchange])
                                .inc();
                        }
                        if let Err(e) = self.bus.enqueue(common::EngineEvent::Market(event)).await
                        {
                            warn!(exchange = %self.exchange, error = %e, "failed to enqueue market event");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            exchange = %self.exchange,
                            error = %e,
                            payload = %truncate(&text, 300),
                            "malformed book frame, dropping"
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

fn truncate(s: &str, n: usize) -> String {
    if s.len() <= n {
        s.to_string()
    } else {
        format!("{}...", &s[..n])
    }
}

#[derive(Deserialize)]
struct BookFrame {
    channel: String,
    #[serde(rename = "type")]
    frame_type: String,
    data: Vec<BookFrameData>,
}

#[derive(Deserialize)]
struct BookFrameData {
    symbol: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    bids: Vec<(f64, f64)>,
    #[serde(default)]
    asks: Vec<(f64, f64)>,
}

/// Parse one exchange feed frame per spec §6's wire schema. Returns `Ok(None)`
/// for frames that are not book-channel updates (including `snapshot`, which
/// the live path ignores) or that fail the "both sides ≥1 level" gate.
fn parse_book_frame(text: &str) -> Result<Option<MarketEvent>, String> {
    let frame: BookFrame = serde_json::from_str(text).map_err(|e| e.to_string())?;

    if frame.channel != "book" || frame.frame_type != "update" {
        return Ok(None);
    }

    let Some(entry) = frame.data.into_iter().next() else {
        return Ok(None);
    };

    if entry.bids.is_empty() || entry.asks.is_empty() {
        debug!(symbol = %entry.symbol, "book frame missing a side, skipped");
        return Ok(None);
    }

    let bids: Vec<BookLevel> = entry
        .bids
        .into_iter()
        .map(|(price, quantity)| BookLevel { price, quantity })
        .collect();
    let asks: Vec<BookLevel> = entry
        .asks
        .into_iter()
        .map(|(price, quantity)| BookLevel { price, quantity })
        .collect();

    let best_bid = bids[0].price;
    let best_ask = asks[0].price;

    let event = MarketEvent {
        symbol: entry.symbol,
        timestamp: entry.timestamp,
        best_bid,
        best_ask,
        bids,
        asks,
    };

    if !event.is_valid() {
        return Ok(None);
    }

    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_update_frame_parses_to_market_event() {
        let text = r#"{"channel":"book","type":"update","data":[{"symbol":"BTC/USD","timestamp":"2024-01-01T00:00:00Z","bids":[[100.0,1.0],[99.0,2.0]],"asks":[[101.0,1.0],[102.0,2.0]]}]}"#;
        let event = parse_book_frame(text).unwrap().unwrap();
        assert_eq!(event.symbol, "BTC/USD");
        assert_eq!(event.best_bid, 100.0);
        assert_eq!(event.best_ask, 101.0);
        assert_eq!(event.bids.len(), 2);
    }

    #[test]
    fn snapshot_frames_are_ignored() {
        let text = r#"{"channel":"book","type":"snapshot","data":[{"symbol":"BTC/USD","timestamp":"2024-01-01T00:00:00Z","bids":[[100.0,1.0]],"asks":[[101.0,1.0]]}]}"#;
        assert!(parse_book_frame(text).unwrap().is_none());
    }

    #[test]
    fn frame_missing_a_side_is_skipped() {
        let text = r#"{"channel":"book","type":"update","data":[{"symbol":"BTC/USD","timestamp":"2024-01-01T00:00:00Z","bids":[],"asks":[[101.0,1.0]]}]}"#;
        assert!(parse_book_frame(text).unwrap().is_none());
    }

    #[test]
    fn crossed_book_is_rejected_by_the_validity_gate() {
        let text = r#"{"channel":"book","type":"update","data":[{"symbol":"BTC/USD","timestamp":"2024-01-01T00:00:00Z","bids":[[105.0,1.0]],"asks":[[101.0,1.0]]}]}"#;
        assert!(parse_book_frame(text).unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_an_error_not_a_panic() {
        let text = "not json";
        assert!(parse_book_frame(text).is_err());
    }

    #[test]
    fn other_channels_are_ignored() {
        let text = r#"{"channel":"trades","type":"update","data":[]}"#;
        assert!(parse_book_frame(text).unwrap().is_none());
    }
}
