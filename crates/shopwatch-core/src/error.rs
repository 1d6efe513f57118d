//! Error types shared across the workspace.

use thiserror::Error;

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, ShopWatchError>;

/// All errors produced by ShopWatch components.
///
/// Failures are scoped to the monitor they originate from: the worker loop
/// recovers from `Fetch` via backoff, the dispatcher recovers from `Channel`
/// via fallback, and nothing here ever takes down another monitor's worker.
#[derive(Debug, Error)]
pub enum ShopWatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
