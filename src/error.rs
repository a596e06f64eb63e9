//! Crate-level error types.
//!
//! Only startup and reactor failures surface as errors. Per-message and
//! per-connection faults are absorbed where they happen and reported to the
//! [`BrokerObserver`](crate::observer::BrokerObserver).

use nix::errno::Errno;

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that abort broker startup or stop the reactor loop.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Readiness poll failed: {0}")]
    Poll(#[from] Errno),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
