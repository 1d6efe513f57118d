//! # ShopWatch Core
//! Shared types, traits, errors, and configuration.
//!
//! Everything the engine needs from its collaborators (store, fetcher,
//! channels) is expressed here as a trait, so the engine crate depends on
//! contracts only and the concrete crates stay leaf-level.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::ShopWatchConfig;
pub use error::{Result, ShopWatchError};
