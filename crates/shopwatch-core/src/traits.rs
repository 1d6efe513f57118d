//! Contracts the engine requires from its collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Lifecycle, Monitor, NotificationRecord, Recipient, Snapshot};

/// Durable storage of monitors, recipients, and the notification audit
/// trail.
///
/// The engine maintains single-writer-per-monitor by construction (one
/// worker per id), so implementations only need to serialize concurrent
/// writes to distinct rows.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Ids of all monitors currently in the `Active` state.
    async fn active_monitor_ids(&self) -> Result<Vec<String>>;

    /// Load one monitor. `Ok(None)` means it vanished or never existed —
    /// workers treat that as normal termination, not an error.
    async fn load_monitor(&self, id: &str) -> Result<Option<Monitor>>;

    async fn load_recipient(&self, id: &str) -> Result<Option<Recipient>>;

    /// Persist last-check timestamp and status line. Called once per worker
    /// iteration, success or failure.
    async fn update_status(&self, id: &str, checked_at: DateTime<Utc>, status: &str)
    -> Result<()>;

    /// Record the product name once a snapshot reveals it.
    async fn update_product_name(&self, id: &str, name: &str) -> Result<()>;

    async fn transition(&self, id: &str, state: Lifecycle) -> Result<()>;

    /// Append one audit row. Never updated afterwards.
    async fn append_notification(&self, record: &NotificationRecord) -> Result<()>;

    // CRUD used by the CLI, not by workers.

    async fn create_recipient(&self, recipient: &Recipient) -> Result<()>;
    async fn create_monitor(&self, monitor: &Monitor) -> Result<()>;
    async fn list_monitors(&self) -> Result<Vec<Monitor>>;
    async fn delete_monitor(&self, id: &str) -> Result<bool>;
    async fn notifications_for(&self, monitor_id: Option<&str>)
    -> Result<Vec<NotificationRecord>>;
}

/// Fetches a structured snapshot of a listing.
///
/// Implementations must bound the request with a timeout — a hung fetch
/// stalls its monitor's worker until the request gives up.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Snapshot>;
}

/// Primary notification channel (mail).
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Whether credentials are present. Unconfigured channels are skipped,
    /// not recorded as failures.
    fn is_configured(&self) -> bool;

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Secondary notification channel (chat gateway).
#[async_trait]
pub trait Messenger: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send(&self, to: &str, body: &str) -> Result<()>;
}
