use thiserror::Error;

/// Transport-level failure of one venue connection. Always absorbed: the
/// venue is reported `disconnected` and never retried.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error("connect to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("send failed: {0}")]
    Send(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstrumentError {
    #[error("instrument symbol is empty")]
    Empty,
    #[error("unsupported quote asset in {symbol} (expected USDT or USDC)")]
    UnsupportedQuote { symbol: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
    #[error("unknown venue `{0}`")]
    UnknownVenue(String),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
