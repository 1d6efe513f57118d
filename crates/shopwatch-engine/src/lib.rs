//! # ShopWatch Engine
//!
//! The monitoring core: one worker per active monitor, driving the
//! poll→evaluate→act loop until a condition is met or the user stops it.
//!
//! ## Architecture
//! ```text
//! Supervisor (registry: monitor id → WorkerHandle)
//!   ├── worker "sneaker-42"  ──┐
//!   ├── worker "jacket-m"     ─┤  each: reload → fetch → evaluate
//!   └── worker "headphones"  ──┘        → persist status
//!                                       → satisfied? dispatch once,
//!                                         mark Satisfied, exit
//!                                       → else sleep poll interval
//!                                       → fetch error? sleep backoff
//!
//! Dispatcher: email (primary, always when addressed)
//!           + whatsapp (secondary, opt-in + phone present)
//! ```
//!
//! Notifications are one-shot by design: a dispatch attempt — delivered or
//! not — ends monitoring for that monitor. The audit trail records what
//! each channel reported; nothing is retried.

pub mod dispatch;
pub mod evaluate;
pub mod supervisor;
pub mod worker;

#[cfg(test)]
mod testsupport;

use std::sync::Arc;

use shopwatch_core::config::EngineConfig;
use shopwatch_core::traits::{ContentFetcher, EntityStore};

pub use dispatch::{ChannelOutcome, DispatchReport, Dispatcher};
pub use evaluate::{Verdict, evaluate, parse_price};
pub use supervisor::Supervisor;

/// Everything a worker needs, wired once at the composition root and shared
/// by all workers. No global state.
pub struct EngineCtx {
    pub store: Arc<dyn EntityStore>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub dispatcher: Dispatcher,
    pub timing: EngineConfig,
}
