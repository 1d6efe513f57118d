//! SQLite-backed persistence for monitors, recipients, and the notification
//! audit trail. Survives restarts; workers pick their monitors back up on
//! the next launch.
//!
//! The engine guarantees single-writer-per-monitor, so a single connection
//! behind a mutex is enough to serialize the remaining concurrency.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use shopwatch_core::error::{Result, ShopWatchError};
use shopwatch_core::traits::EntityStore;
use shopwatch_core::types::{
    ChannelKind, DeliveryOutcome, Lifecycle, Monitor, NotificationRecord, Recipient,
};

/// SQLite store implementing the engine's persistence contract.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS recipients (
                id TEXT PRIMARY KEY,
                email TEXT,
                phone TEXT,
                whatsapp_opt_in INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS monitors (
                id TEXT PRIMARY KEY,
                recipient_id TEXT NOT NULL,
                url TEXT NOT NULL,
                product_name TEXT,
                conditions TEXT NOT NULL,        -- JSON
                state TEXT NOT NULL DEFAULT 'active',
                last_checked TEXT,
                last_status TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (recipient_id) REFERENCES recipients(id) ON DELETE CASCADE
            );

            -- Append-only audit trail: one row per dispatch attempt per channel.
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                monitor_id TEXT NOT NULL,
                channel TEXT NOT NULL,
                message TEXT NOT NULL,
                outcome TEXT NOT NULL,
                sent_at TEXT NOT NULL
            );
            ",
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ShopWatchError::Store(format!("Lock poisoned: {e}")))
    }
}

fn store_err(e: impl std::fmt::Display) -> ShopWatchError {
    ShopWatchError::Store(e.to_string())
}

fn row_to_monitor(row: &rusqlite::Row<'_>) -> rusqlite::Result<Monitor> {
    let conditions_json: String = row.get(4)?;
    let state_str: String = row.get(5)?;
    Ok(Monitor {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        url: row.get(2)?,
        product_name: row.get(3)?,
        conditions: serde_json::from_str(&conditions_json).unwrap_or_default(),
        state: Lifecycle::parse(&state_str).unwrap_or(Lifecycle::Stopped),
        last_checked: row
            .get::<_, Option<String>>(6)?
            .and_then(|s| parse_utc(&s)),
        last_status: row.get(7)?,
        created_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_utc(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

const MONITOR_COLUMNS: &str =
    "id, recipient_id, url, product_name, conditions, state, last_checked, last_status, created_at";

#[async_trait]
impl EntityStore for SqliteStore {
    async fn active_monitor_ids(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM monitors WHERE state = 'active' ORDER BY created_at")
            .map_err(store_err)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(store_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }

    async fn load_monitor(&self, id: &str) -> Result<Option<Monitor>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = ?1"
            ))
            .map_err(store_err)?;
        let monitor = stmt
            .query_row(rusqlite::params![id], row_to_monitor)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(store_err(other)),
            })?;
        Ok(monitor)
    }

    async fn load_recipient(&self, id: &str) -> Result<Option<Recipient>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, email, phone, whatsapp_opt_in, created_at
                 FROM recipients WHERE id = ?1",
            )
            .map_err(store_err)?;
        let recipient = stmt
            .query_row(rusqlite::params![id], |row| {
                Ok(Recipient {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    phone: row.get(2)?,
                    whatsapp_opt_in: row.get::<_, i32>(3)? != 0,
                    created_at: row
                        .get::<_, String>(4)
                        .ok()
                        .and_then(|s| parse_utc(&s))
                        .unwrap_or_else(Utc::now),
                })
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(store_err(other)),
            })?;
        Ok(recipient)
    }

    async fn update_status(
        &self,
        id: &str,
        checked_at: DateTime<Utc>,
        status: &str,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE monitors SET last_checked = ?1, last_status = ?2 WHERE id = ?3",
            rusqlite::params![checked_at.to_rfc3339(), status, id],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn update_product_name(&self, id: &str, name: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE monitors SET product_name = ?1 WHERE id = ?2",
            rusqlite::params![name, id],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn transition(&self, id: &str, state: Lifecycle) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE monitors SET state = ?1 WHERE id = ?2",
                rusqlite::params![state.as_str(), id],
            )
            .map_err(store_err)?;
        if changed == 0 {
            return Err(ShopWatchError::NotFound(format!("monitor {id}")));
        }
        tracing::debug!(monitor_id = %id, state = state.as_str(), "lifecycle transition");
        Ok(())
    }

    async fn append_notification(&self, record: &NotificationRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications (monitor_id, channel, message, outcome, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                record.monitor_id,
                record.channel.as_str(),
                record.message,
                match record.outcome {
                    DeliveryOutcome::Delivered => "delivered",
                    DeliveryOutcome::Failed => "failed",
                },
                record.sent_at.to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn create_recipient(&self, recipient: &Recipient) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO recipients (id, email, phone, whatsapp_opt_in, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                recipient.id,
                recipient.email,
                recipient.phone,
                recipient.whatsapp_opt_in as i32,
                recipient.created_at.to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn create_monitor(&self, monitor: &Monitor) -> Result<()> {
        let conditions = serde_json::to_string(&monitor.conditions)
            .map_err(|e| ShopWatchError::Store(format!("Serialize conditions: {e}")))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO monitors
             (id, recipient_id, url, product_name, conditions, state, last_checked, last_status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                monitor.id,
                monitor.recipient_id,
                monitor.url,
                monitor.product_name,
                conditions,
                monitor.state.as_str(),
                monitor.last_checked.map(|t| t.to_rfc3339()),
                monitor.last_status,
                monitor.created_at.to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        tracing::debug!(monitor_id = %monitor.id, url = %monitor.url, "monitor created");
        Ok(())
    }

    async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MONITOR_COLUMNS} FROM monitors ORDER BY created_at"
            ))
            .map_err(store_err)?;
        let monitors = stmt
            .query_map([], row_to_monitor)
            .map_err(store_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(monitors)
    }

    async fn delete_monitor(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM monitors WHERE id = ?1", rusqlite::params![id])
            .map_err(store_err)?;
        Ok(deleted > 0)
    }

    async fn notifications_for(
        &self,
        monitor_id: Option<&str>,
    ) -> Result<Vec<NotificationRecord>> {
        let conn = self.lock()?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<NotificationRecord> {
            let channel: String = row.get(1)?;
            let outcome: String = row.get(3)?;
            Ok(NotificationRecord {
                monitor_id: row.get(0)?,
                channel: if channel == "whatsapp" {
                    ChannelKind::WhatsApp
                } else {
                    ChannelKind::Email
                },
                message: row.get(2)?,
                outcome: if outcome == "delivered" {
                    DeliveryOutcome::Delivered
                } else {
                    DeliveryOutcome::Failed
                },
                sent_at: row
                    .get::<_, String>(4)
                    .ok()
                    .and_then(|s| parse_utc(&s))
                    .unwrap_or_else(Utc::now),
            })
        };

        let records = match monitor_id {
            Some(id) => {
                let mut stmt = conn
                    .prepare(
                        "SELECT monitor_id, channel, message, outcome, sent_at
                         FROM notifications WHERE monitor_id = ?1 ORDER BY sent_at DESC",
                    )
                    .map_err(store_err)?;
                let rows = stmt
                    .query_map(rusqlite::params![id], map_row)
                    .map_err(store_err)?
                    .filter_map(|r| r.ok())
                    .collect();
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare(
                        "SELECT monitor_id, channel, message, outcome, sent_at
                         FROM notifications ORDER BY sent_at DESC",
                    )
                    .map_err(store_err)?;
                let rows = stmt
                    .query_map([], map_row)
                    .map_err(store_err)?
                    .filter_map(|r| r.ok())
                    .collect();
                rows
            }
        };
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopwatch_core::types::Conditions;

    fn sample_monitor(recipient_id: &str) -> Monitor {
        Monitor::new(
            recipient_id,
            "https://shop.example/sneaker-42",
            Conditions {
                stock: true,
                size: Some("42".into()),
                delivery: false,
                price: Some(1500.0),
            },
        )
    }

    async fn seeded_store() -> (SqliteStore, Monitor) {
        let store = SqliteStore::open_in_memory().unwrap();
        let recipient = Recipient::new(Some("a@example.com".into()), None, false);
        store.create_recipient(&recipient).await.unwrap();
        let monitor = sample_monitor(&recipient.id);
        store.create_monitor(&monitor).await.unwrap();
        (store, monitor)
    }

    #[tokio::test]
    async fn monitor_roundtrip() {
        let (store, monitor) = seeded_store().await;
        let loaded = store.load_monitor(&monitor.id).await.unwrap().unwrap();
        assert_eq!(loaded.url, monitor.url);
        assert_eq!(loaded.conditions, monitor.conditions);
        assert_eq!(loaded.state, Lifecycle::Active);
        assert!(loaded.last_checked.is_none());
    }

    #[tokio::test]
    async fn missing_monitor_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_monitor("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_ids_follow_transitions() {
        let (store, monitor) = seeded_store().await;
        assert_eq!(store.active_monitor_ids().await.unwrap(), vec![monitor.id.clone()]);

        store.transition(&monitor.id, Lifecycle::Satisfied).await.unwrap();
        assert!(store.active_monitor_ids().await.unwrap().is_empty());
        let loaded = store.load_monitor(&monitor.id).await.unwrap().unwrap();
        assert_eq!(loaded.state, Lifecycle::Satisfied);
    }

    #[tokio::test]
    async fn transition_unknown_id_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.transition("ghost", Lifecycle::Stopped).await.unwrap_err();
        assert!(matches!(err, ShopWatchError::NotFound(_)));
    }

    #[tokio::test]
    async fn status_update_persists() {
        let (store, monitor) = seeded_store().await;
        let now = Utc::now();
        store
            .update_status(&monitor.id, now, "Conditions not yet met")
            .await
            .unwrap();
        let loaded = store.load_monitor(&monitor.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_status.as_deref(), Some("Conditions not yet met"));
        assert!(loaded.last_checked.is_some());
    }

    #[tokio::test]
    async fn notification_audit_trail() {
        let (store, monitor) = seeded_store().await;
        store
            .append_notification(&NotificationRecord {
                monitor_id: monitor.id.clone(),
                channel: ChannelKind::Email,
                message: "Good news".into(),
                outcome: DeliveryOutcome::Delivered,
                sent_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .append_notification(&NotificationRecord {
                monitor_id: monitor.id.clone(),
                channel: ChannelKind::WhatsApp,
                message: "Good news".into(),
                outcome: DeliveryOutcome::Failed,
                sent_at: Utc::now(),
            })
            .await
            .unwrap();

        let all = store.notifications_for(None).await.unwrap();
        assert_eq!(all.len(), 2);
        let scoped = store.notifications_for(Some(&monitor.id)).await.unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().any(|r| r.channel == ChannelKind::WhatsApp
            && r.outcome == DeliveryOutcome::Failed));
        assert!(store.notifications_for(Some("other")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_monitor_reports_existence() {
        let (store, monitor) = seeded_store().await;
        assert!(store.delete_monitor(&monitor.id).await.unwrap());
        assert!(!store.delete_monitor(&monitor.id).await.unwrap());
    }
}
