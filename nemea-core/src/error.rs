use thiserror::Error;

/// Errors the core surfaces to its caller. Every variant here is handled —
/// logged and counted, or mapped to a fatal exit by the controller binary —
/// never a silent swallow (§7).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed record on channel {channel}: {reason}")]
    MalformedRecord { channel: String, reason: String },

    #[error("resolver failure for domain {domain}: {reason}")]
    ResolverFailure { domain: String, reason: String },

    #[error("watchlist write failed: {0}")]
    WatchlistWrite(String),

    #[error("output send timed out on channel {0}")]
    SendTimeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
