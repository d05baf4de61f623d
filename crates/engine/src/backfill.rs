use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use common::{Candle, Error, Result};
use strategy::BackfillSource;

const BASE_URL: &str = "https://api.binance.com";

/// One-shot historical candle fetch off a public REST klines endpoint,
/// grounded on the `backfill_connector.fetch_initial_candles` collaborator
/// the original strategy is handed at startup. The data venue's timeframe is
/// expressed as Binance-style interval strings (`1h`, `15m`, ...).
pub struct RestBackfill {
    http: Client,
    base_url: String,
}

impl RestBackfill {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("failed to build HTTP client"),
            base_url: BASE_URL.to_string(),
        }
    }
}

impl Default for RestBackfill {
    fn default() -> Self {
        Self::new()
    }
}

fn interval_string(timeframe_minutes: i64) -> String {
    if timeframe_minutes % (24 * 60) == 0 {
        format!("{}d", timeframe_minutes / (24 * 60))
    } else if timeframe_minutes % 60 == 0 {
        format!("{}h", timeframe_minutes / 60)
    } else {
        format!("{}m", timeframe_minutes)
    }
}

#[async_trait]
impl BackfillSource for RestBackfill {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe_minutes: i64,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let rest_symbol = symbol.replace('/', "");
        let interval = interval_string(timeframe_minutes);
        // Request one extra candle: the venue's most recent bar is still in
        // progress and must be dropped, not fed to the assembler as finalized.
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            rest_symbol,
            interval,
            limit + 1
        );

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Config(format!(
                "backfill request for {symbol} failed: HTTP {}",
                resp.status()
            )));
        }

        let rows: Vec<KlineRow> = resp
            .json()
            .await
            .map_err(|e| Error::Malformed(e.to_string()))?;

        let mut candles: Vec<Candle> = rows
            .into_iter()
            .filter_map(|row| row.into_candle())
            .collect();

        // Drop the final, still-forming candle.
        candles.pop();
        if candles.len() > limit {
            let excess = candles.len() - limit;
            candles.drain(0..excess);
        }

        Ok(candles)
    }
}

/// Binance klines are untagged arrays: `[open_time, open, high, low, close,
/// volume, close_time, ...]`. Only the first six fields are used.
#[derive(Deserialize)]
struct KlineRow(
    i64,
    String,
    String,
    String,
    String,
    String,
    #[serde(default)] serde_json::Value,
);

impl KlineRow {
    fn into_candle(self) -> Option<Candle> {
        let start_time = chrono::DateTime::from_timestamp(self.0 / 1000, 0)?;
        Some(Candle {
            start_time,
            open: self.1.parse().ok()?,
            high: self.2.parse().ok()?,
            low: self.3.parse().ok()?,
            close: self.4.parse().ok()?,
            volume: self.5.parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_string_formats_hours_and_minutes() {
        assert_eq!(interval_string(60), "1h");
        assert_eq!(interval_string(15), "15m");
        assert_eq!(interval_string(1440), "1d");
    }
}
