use thiserror::Error;

/// Fatal configuration errors. Construction-time only — never raised once
/// a `Config` has been built successfully.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no symbols configured")]
    EmptySymbols,
    #[error("unknown timeframe {0:?}, expected one of 1s, 1m, 5m")]
    UnknownTimeframe(String),
    #[error("no timeframes configured")]
    EmptyTimeframes,
    #[error("rolling window must be >= 5, got {0}")]
    WindowTooSmall(usize),
    #[error("{0} must be positive, got {1}")]
    NotPositive(&'static str, f64),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("pool/lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("feed shutting down")]
    ShuttingDown,
}
