//! In-memory fakes shared by the engine's unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shopwatch_core::error::{Result, ShopWatchError};
use shopwatch_core::traits::{ContentFetcher, EntityStore, Mailer, Messenger};
use shopwatch_core::types::{
    Availability, Lifecycle, Monitor, NotificationRecord, Recipient, Snapshot,
};

/// In-memory store with the same semantics the sqlite store provides.
#[derive(Default)]
pub struct MockStore {
    pub monitors: Mutex<HashMap<String, Monitor>>,
    pub recipients: Mutex<HashMap<String, Recipient>>,
    pub records: Mutex<Vec<NotificationRecord>>,
}

impl MockStore {
    pub fn with(monitor: Monitor, recipient: Recipient) -> Self {
        let store = Self::default();
        store
            .recipients
            .lock()
            .unwrap()
            .insert(recipient.id.clone(), recipient);
        store
            .monitors
            .lock()
            .unwrap()
            .insert(monitor.id.clone(), monitor);
        store
    }

    pub fn insert_monitor(&self, monitor: Monitor) {
        self.monitors
            .lock()
            .unwrap()
            .insert(monitor.id.clone(), monitor);
    }

    pub fn state_of(&self, id: &str) -> Option<Lifecycle> {
        self.monitors.lock().unwrap().get(id).map(|m| m.state)
    }

    pub fn status_of(&self, id: &str) -> Option<String> {
        self.monitors
            .lock()
            .unwrap()
            .get(id)
            .and_then(|m| m.last_status.clone())
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl EntityStore for MockStore {
    async fn active_monitor_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .monitors
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.state == Lifecycle::Active)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn load_monitor(&self, id: &str) -> Result<Option<Monitor>> {
        Ok(self.monitors.lock().unwrap().get(id).cloned())
    }

    async fn load_recipient(&self, id: &str) -> Result<Option<Recipient>> {
        Ok(self.recipients.lock().unwrap().get(id).cloned())
    }

    async fn update_status(
        &self,
        id: &str,
        checked_at: DateTime<Utc>,
        status: &str,
    ) -> Result<()> {
        if let Some(m) = self.monitors.lock().unwrap().get_mut(id) {
            m.last_checked = Some(checked_at);
            m.last_status = Some(status.to_string());
        }
        Ok(())
    }

    async fn update_product_name(&self, id: &str, name: &str) -> Result<()> {
        if let Some(m) = self.monitors.lock().unwrap().get_mut(id) {
            m.product_name = Some(name.to_string());
        }
        Ok(())
    }

    async fn transition(&self, id: &str, state: Lifecycle) -> Result<()> {
        match self.monitors.lock().unwrap().get_mut(id) {
            Some(m) => {
                m.state = state;
                Ok(())
            }
            None => Err(ShopWatchError::NotFound(format!("monitor {id}"))),
        }
    }

    async fn append_notification(&self, record: &NotificationRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn create_recipient(&self, recipient: &Recipient) -> Result<()> {
        self.recipients
            .lock()
            .unwrap()
            .insert(recipient.id.clone(), recipient.clone());
        Ok(())
    }

    async fn create_monitor(&self, monitor: &Monitor) -> Result<()> {
        self.insert_monitor(monitor.clone());
        Ok(())
    }

    async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        Ok(self.monitors.lock().unwrap().values().cloned().collect())
    }

    async fn delete_monitor(&self, id: &str) -> Result<bool> {
        Ok(self.monitors.lock().unwrap().remove(id).is_some())
    }

    async fn notifications_for(
        &self,
        monitor_id: Option<&str>,
    ) -> Result<Vec<NotificationRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| monitor_id.is_none_or(|id| r.monitor_id == id))
            .cloned()
            .collect())
    }
}

/// One scripted fetch result.
#[derive(Clone)]
pub enum Fetch {
    Ok(Snapshot),
    Err(&'static str),
}

/// Fetcher that replays a script; the final entry repeats forever.
pub struct ScriptedFetcher {
    script: Vec<Fetch>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Fetch>) -> Self {
        assert!(!script.is_empty());
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str) -> Result<Snapshot> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.get(n).unwrap_or_else(|| {
            self.script.last().expect("non-empty script")
        });
        match step {
            Fetch::Ok(snapshot) => Ok(snapshot.clone()),
            Fetch::Err(msg) => Err(ShopWatchError::Fetch((*msg).to_string())),
        }
    }
}

pub fn in_stock_snapshot() -> Snapshot {
    Snapshot {
        name: Some("Trail Runner X".into()),
        availability: Availability::InStock,
        sizes: vec!["42".into()],
        price_text: Some("₹1200".into()),
        delivery_text: Some("Delivery available".into()),
    }
}

pub fn out_of_stock_snapshot() -> Snapshot {
    Snapshot {
        name: Some("Trail Runner X".into()),
        availability: Availability::OutOfStock,
        sizes: vec![],
        price_text: None,
        delivery_text: None,
    }
}

/// Mailer that records sends and can be told to fail or play unconfigured.
pub struct RecordingMailer {
    configured: bool,
    fail: bool,
    sent: AtomicUsize,
}

impl RecordingMailer {
    pub fn working() -> Self {
        Self {
            configured: true,
            fail: false,
            sent: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::working()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::working()
        }
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
        if self.fail {
            return Err(ShopWatchError::Channel("smtp rejected".into()));
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Messenger counterpart of [`RecordingMailer`].
pub struct RecordingMessenger {
    configured: bool,
    fail: bool,
    sent: AtomicUsize,
}

impl RecordingMessenger {
    pub fn working() -> Self {
        Self {
            configured: true,
            fail: false,
            sent: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::working()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::working()
        }
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, _to: &str, _body: &str) -> Result<()> {
        if self.fail {
            return Err(ShopWatchError::Channel("gateway rejected".into()));
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
