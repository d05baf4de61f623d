use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{error, info};

use crate::{Error, Result};

/// Key-value publication surface. `strategy` and `portfolio` each hold one,
/// constructed once at startup and injected — absence of a reachable store is
/// tolerated (spec §9 design note): callers log at ERROR and continue in
/// degraded mode rather than treat a KV outage as fatal.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Read back a previously published snapshot. Used by the HTTP dashboard
    /// surface (spec §6) rather than by anything inside the core — the core
    /// never reads its own published state.
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Redis-backed `KvStore`. `ConnectionManager` reconnects transparently on
/// drop, so a single instance can be shared across tasks without an
/// additional retry layer.
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(Error::from)?;
        let conn = client.get_connection_manager().await.map_err(Error::from)?;
        info!(url, "connected to KV store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(|e| {
            error!(key, error = %e, "KV publish failed");
            Error::from(e)
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| {
            error!(key, error = %e, "KV read failed");
            Error::from(e)
        })
    }
}
