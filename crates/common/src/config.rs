use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-strategy parameter bag. Kept as a generic YAML value map since
/// weights/thresholds differ per strategy and the funnel reads them by name
/// with typed defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyParams(pub HashMap<String, serde_yaml::Value>);

impl StrategyParams {
    pub fn f64(&self, key: &str, default: f64) -> f64 {
        self.0
            .get(key)
            .and_then(|v| v.as_f64())
            .unwrap_or(default)
    }

    pub fn usize(&self, key: &str, default: usize) -> usize {
        self.0
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.0
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| default.to_string())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyPair {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub secret: String,
}

fn default_simulated() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LiveTradingConfig {
    pub data_source_id: String,
    pub execution_exchange_id: String,
    #[serde(default)]
    pub is_testnet: bool,
    /// Whether the execution handler is `engine::execution::SimulatedExecution`
    /// (paper) or `LiveExecution` (real order placement). Defaults to `true`
    /// so a config with no explicit opt-in never places real orders.
    #[serde(default = "default_simulated")]
    pub simulated: bool,
    #[serde(default)]
    pub api_keys: HashMap<String, ApiKeyPair>,
    /// Configurable symbol translation from the data venue to the execution
    /// venue (e.g. `"BTC/USD" -> "BTC/USDT"`), replacing the hardcoded single
    /// rule in the original implementation (spec §9 Open Question).
    #[serde(default)]
    pub symbol_translation: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeSymbols {
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Book-channel WebSocket endpoint for this venue. Not named in spec §6's
    /// schema (which only lists `symbols`) but required to actually dial a
    /// connector; kept per-venue rather than hardcoded so a config can point
    /// at a testnet or mock feed.
    pub ws_url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DataAcquisitionConfig {
    #[serde(default)]
    pub exchanges: HashMap<String, ExchangeSymbols>,
}

fn default_bus_capacity() -> usize {
    10_000
}
fn default_history_length() -> usize {
    250
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_panic_file_path() -> String {
    "/app/panic.kill".to_string()
}
fn default_kv_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_dashboard_port() -> u16 {
    8080
}
fn default_initial_capital() -> f64 {
    10_000.0
}

/// Root configuration, loaded from a single YAML file. Top-level keys not
/// named here are ignored, per spec §6.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub active_strategy: String,
    #[serde(default)]
    pub strategies: HashMap<String, StrategyParams>,
    pub live_trading: LiveTradingConfig,
    #[serde(default)]
    pub data_acquisition: DataAcquisitionConfig,

    // Ambient infrastructure settings. Not named in spec §6's schema, but
    // this is our own config surface to define, not an "unknown key".
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
    #[serde(default = "default_history_length")]
    pub history_length: usize,
    #[serde(default = "default_kv_url")]
    pub kv_url: String,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_panic_file_path")]
    pub panic_file_path: String,
    #[serde(default = "default_dashboard_port")]
    pub dashboard_port: u16,
    #[serde(default)]
    pub dashboard_token: String,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
}

impl Config {
    /// Load from a YAML file at `path`. Panics with a clear message on any
    /// read/parse failure — configuration/startup errors are fatal per spec §7.
    pub fn load(path: &str) -> Self {
        let _ = dotenvy::dotenv();

        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read config file '{path}': {e}"));
        let mut cfg: Config = serde_yaml::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse config file '{path}': {e}"));

        cfg.apply_env_overrides();

        if !cfg.strategies.contains_key(&cfg.active_strategy) {
            panic!(
                "active_strategy '{}' has no matching entry under 'strategies'",
                cfg.active_strategy
            );
        }

        cfg
    }

    /// Secrets may be overridden by environment variables named
    /// `<VENUE>_API_KEY` / `<VENUE>_SECRET` (venue upper-cased), so API keys
    /// never need to be checked into the YAML file.
    fn apply_env_overrides(&mut self) {
        for (venue, pair) in self.live_trading.api_keys.iter_mut() {
            let venue_upper = venue.to_uppercase();
            if let Ok(key) = std::env::var(format!("{venue_upper}_API_KEY")) {
                pair.api_key = key;
            }
            if let Ok(secret) = std::env::var(format!("{venue_upper}_SECRET")) {
                pair.secret = secret;
            }
        }
        if let Ok(token) = std::env::var("DASHBOARD_TOKEN") {
            self.dashboard_token = token;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_params_typed_getters_fall_back_to_defaults() {
        let params = StrategyParams::default();
        assert_eq!(params.f64("buy_threshold", 5.0), 5.0);
        assert_eq!(params.usize("history_length", 250), 250);
        assert_eq!(params.string("primary_symbol", "BTC/USD"), "BTC/USD");
    }

    #[test]
    fn strategy_params_typed_getters_read_configured_values() {
        let yaml = "buy_threshold: 7.5\nhistory_length: 100\nprimary_symbol: ETH/USD\n";
        let map: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(yaml).unwrap();
        let params = StrategyParams(map);
        assert_eq!(params.f64("buy_threshold", 5.0), 7.5);
        assert_eq!(params.usize("history_length", 250), 100);
        assert_eq!(params.string("primary_symbol", "BTC/USD"), "ETH/USD");
    }

    #[test]
    fn config_deserializes_minimal_yaml_with_defaults() {
        let yaml = r#"
active_strategy: main
strategies:
  main: {}
live_trading:
  data_source_id: binance
  execution_exchange_id: binance
data_acquisition:
  exchanges:
    binance:
      symbols: ["BTC/USD"]
      ws_url: "wss://example/ws"
some_unknown_key: ignored
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.active_strategy, "main");
        assert!(cfg.live_trading.simulated, "simulated must default true");
        assert_eq!(cfg.bus_capacity, 10_000);
        assert_eq!(cfg.initial_capital, 10_000.0);
        assert_eq!(
            cfg.data_acquisition.exchanges["binance"].symbols,
            vec!["BTC/USD".to_string()]
        );
    }
}
