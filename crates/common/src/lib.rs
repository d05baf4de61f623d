pub mod config;
pub mod error;
pub mod exchange;
pub mod kv;
pub mod metrics;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use exchange::ExchangeClient;
pub use kv::{KvStore, RedisKv};
pub use metrics::{MetricsRegistry, MetricsServer};
pub use types::*;
