use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use common::{Error, ExchangeClient, FillEvent, OrderEvent, Result};

const BASE_URL: &str = "https://api.binance.com";
const TESTNET_URL: &str = "https://testnet.binance.vision";

/// Places real orders against an exchange REST API. Construction is two-step
/// per spec §4.6: `new` wires credentials only, `connect` asynchronously
/// loads market metadata; failure there aborts startup rather than limping
/// along with an unvalidated symbol set.
pub struct LiveExecution {
    exchange_id: String,
    api_key: String,
    secret: String,
    base_url: String,
    http: Client,
    symbol_translation: HashMap<String, String>,
}

impl LiveExecution {
    pub fn new(
        exchange_id: impl Into<String>,
        api_key: impl Into<String>,
        secret: impl Into<String>,
        is_testnet: bool,
        symbol_translation: HashMap<String, String>,
    ) -> Self {
        Self {
            exchange_id: exchange_id.into(),
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: if is_testnet {
                TESTNET_URL.to_string()
            } else {
                BASE_URL.to_string()
            },
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("failed to build HTTP client"),
            symbol_translation,
        }
    }

    /// Load market metadata for the configured venue. Must be awaited before
    /// the handler is handed to the dispatcher; a failure here is a
    /// configuration/startup error and is fatal per spec §7.
    pub async fn connect(&self) -> Result<()> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Config(format!("failed to load markets: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Config(format!(
                "exchange {} rejected exchangeInfo request: HTTP {}",
                self.exchange_id,
                resp.status()
            )));
        }

        info!(exchange = %self.exchange_id, "markets loaded");
        Ok(())
    }

    /// Translate a data-venue symbol (e.g. `BTC/USD`) to the execution venue's
    /// format via the configured table, falling back to the symbol unchanged
    /// (spec §9 Open Question: the original's single hardcoded rule is
    /// replaced here by a configurable table).
    fn translate_symbol(&self, symbol: &str) -> String {
        self.symbol_translation
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| symbol.to_string())
    }

    fn sign(&self, query: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64
    }

    async fn place_market_order(
        &self,
        execution_symbol: &str,
        side: common::Side,
        quantity: f64,
    ) -> Result<OrderResponse> {
        let ts = Self::timestamp_ms();
        let binance_symbol = execution_symbol.replace('/', "");
        let params = format!(
            "symbol={binance_symbol}&side={}&type=MARKET&quantity={quantity}&timestamp={ts}",
            side
        );
        let signature = self.sign(&params);
        let body = format!("{params}&signature={signature}");
        let url = format!("{}/api/v3/order", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if status.as_u16() == 403 || status.as_u16() == 400 {
            if text.contains("Invalid symbol") {
                return Err(Error::OrderRejected(format!("bad symbol {execution_symbol}")));
            }
            if text.contains("insufficient balance") || text.contains("Account has insufficient") {
                return Err(Error::OrderRejected("insufficient funds".to_string()));
            }
        }
        if !status.is_success() {
            return Err(Error::OrderRejected(format!("HTTP {status}: {text}")));
        }

        debug!(execution_symbol, response = %text, "exchange order response");
        serde_json::from_str(&text).map_err(Error::from)
    }
}

#[async_trait]
impl ExchangeClient for LiveExecution {
    async fn submit_order(&self, order: &OrderEvent, _last_price: f64) -> Result<FillEvent> {
        let execution_symbol = self.translate_symbol(&order.symbol);
        info!(
            symbol = %order.symbol,
            execution_symbol,
            side = %order.side,
            quantity = order.quantity,
            "live execution: submitting order"
        );

        let resp = self
            .place_market_order(&execution_symbol, order.side, order.quantity)
            .await?;

        let filled = resp.filled();
        let average = resp.average();
        let transact_time = resp
            .transact_time
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        if filled > 0.0 && average.is_some() && transact_time.is_some() {
            let timestamp = transact_time.unwrap();

            Ok(FillEvent {
                timestamp,
                symbol: order.symbol.clone(),
                side: order.side,
                quantity: filled,
                price: average.unwrap(),
                commission: resp.fee_cost(),
                exchange: self.exchange_id.clone(),
                stop_loss_price: order.stop_loss_price,
                take_profit_price: order.take_profit_price,
            })
        } else {
            warn!(symbol = %order.symbol, "order not filled or response incomplete, discarding");
            Err(Error::OrderRejected("incomplete exchange response".to_string()))
        }
    }
}

/// Binance's `POST /api/v3/order` response has no single `average`/`filled`
/// field; both are derived here from `executedQty` and the per-fill legs.
#[derive(Deserialize)]
struct OrderResponse {
    #[serde(rename = "transactTime")]
    transact_time: Option<i64>,
    #[serde(rename = "executedQty", default)]
    executed_qty: Option<String>,
    #[serde(default)]
    fills: Vec<FillDetail>,
}

impl OrderResponse {
    fn filled(&self) -> f64 {
        self.executed_qty
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0)
    }

    fn average(&self) -> Option<f64> {
        if self.fills.is_empty() {
            return None;
        }
        let (qty_sum, notional_sum) = self.fills.iter().fold((0.0, 0.0), |(q, n), f| {
            let price: f64 = f.price.parse().unwrap_or(0.0);
            let qty: f64 = f.qty.parse().unwrap_or(0.0);
            (q + qty, n + price * qty)
        });
        (qty_sum > 0.0).then(|| notional_sum / qty_sum)
    }

    fn fee_cost(&self) -> f64 {
        self.fills
            .iter()
            .filter_map(|f| f.commission.parse::<f64>().ok())
            .sum()
    }
}

#[derive(Deserialize)]
struct FillDetail {
    price: String,
    qty: String,
    commission: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_symbol_uses_configured_table() {
        let mut table = HashMap::new();
        table.insert("BTC/USD".to_string(), "BTC/USDT".to_string());
        let exec = LiveExecution::new("binance", "key", "secret", true, table);
        assert_eq!(exec.translate_symbol("BTC/USD"), "BTC/USDT");
    }

    #[test]
    fn translate_symbol_falls_back_unchanged_when_not_configured() {
        let exec = LiveExecution::new("binance", "key", "secret", true, HashMap::new());
        assert_eq!(exec.translate_symbol("ETH/USD"), "ETH/USD");
    }

    #[test]
    fn order_response_average_is_volume_weighted() {
        let resp = OrderResponse {
            transact_time: Some(1_700_000_000_000),
            executed_qty: Some("1.5".to_string()),
            fills: vec![
                FillDetail { price: "100.0".to_string(), qty: "1.0".to_string(), commission: "0.01".to_string() },
                FillDetail { price: "102.0".to_string(), qty: "0.5".to_string(), commission: "0.005".to_string() },
            ],
        };
        assert_eq!(resp.filled(), 1.5);
        let avg = resp.average().unwrap();
        assert!((avg - (100.0 * 1.0 + 102.0 * 0.5) / 1.5).abs() < 1e-9);
        assert!((resp.fee_cost() - 0.015).abs() < 1e-9);
    }

    #[test]
    fn order_response_with_no_fills_has_no_average() {
        let resp = OrderResponse {
            transact_time: Some(1_700_000_000_000),
            executed_qty: Some("0".to_string()),
            fills: vec![],
        };
        assert_eq!(resp.filled(), 0.0);
        assert!(resp.average().is_none());
    }
}
