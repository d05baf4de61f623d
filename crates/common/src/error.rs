use thiserror::Error;

/// Error taxonomy. Variant boundaries match the propagation policy: only
/// `Config` escapes to process exit, everything else is handled at the
/// component that raised it.
#[derive(Debug, Error)]
pub enum Error {
    /// Transient transport failure (websocket drop, HTTP 5xx, rate limit).
    /// Logged at WARN, retried with fixed backoff, never propagates.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed frame (missing key, bad JSON, schema mismatch). Logged at
    /// WARN with a truncated payload; the frame is dropped, the stream continues.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// KV unreachable, file write refused, and similar. Logged at ERROR; the
    /// operation is skipped and the core keeps running in degraded mode.
    #[error("operational error: {0}")]
    Operational(String),

    /// Order rejected by the exchange (`InsufficientFunds`, `BadSymbol`, or an
    /// unexpected response shape). Logged at ERROR; no FILL emitted, no retry.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Unknown strategy, market-metadata load failure, missing backfill
    /// source. Fatal — the caller should exit the process non-zero.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant breach (e.g. a closing fill with quantity not
    /// matching the open position). Logged at ERROR with context; the
    /// handler returns, the dispatcher continues.
    #[error("internal invariant breach: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Malformed(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Operational(e.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Operational(e.to_string())
    }
}
