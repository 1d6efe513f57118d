//! Process-wide registry of monitor workers.
//!
//! Owns the map from monitor id to worker handle and enforces
//! at-most-one-worker-per-monitor: starting an id that is already
//! registered is an idempotent no-op. Workers deregister themselves when
//! they reach a terminal state, so the registry always reflects live
//! workers only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use shopwatch_core::error::Result;
use shopwatch_core::types::Lifecycle;

use crate::EngineCtx;
use crate::worker;

/// Cancellation signal and join handle for one live worker.
struct WorkerHandle {
    cancel: watch::Sender<bool>,
    join: JoinHandle<()>,
}

type Registry = Arc<Mutex<HashMap<String, WorkerHandle>>>;

/// Starts, tracks, and stops per-monitor workers.
pub struct Supervisor {
    ctx: Arc<EngineCtx>,
    registry: Registry,
}

impl Supervisor {
    pub fn new(ctx: Arc<EngineCtx>) -> Self {
        Self {
            ctx,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start workers for every monitor currently Active in the store.
    /// Returns how many workers were started.
    pub async fn start_all(&self) -> Result<usize> {
        let ids = self.ctx.store.active_monitor_ids().await?;
        let mut started = 0;
        for id in &ids {
            if self.start(id) {
                started += 1;
            }
        }
        tracing::info!("⏰ supervisor started {started} worker(s)");
        Ok(started)
    }

    /// Start one worker. Returns false (and does nothing) when a worker for
    /// this id is already registered.
    pub fn start(&self, monitor_id: &str) -> bool {
        let mut registry = self.registry.lock().expect("registry lock");
        if registry.contains_key(monitor_id) {
            tracing::debug!(monitor_id = %monitor_id, "worker already registered, start is a no-op");
            return false;
        }

        let (cancel, cancel_rx) = watch::channel(false);
        let ctx = self.ctx.clone();
        let self_registry = self.registry.clone();
        let id = monitor_id.to_string();
        let join = tokio::spawn(async move {
            worker::run_worker(ctx, id.clone(), cancel_rx).await;
            // terminal state reached: drop the registry entry
            self_registry.lock().expect("registry lock").remove(&id);
        });

        registry.insert(
            monitor_id.to_string(),
            WorkerHandle { cancel, join },
        );
        true
    }

    /// User-initiated stop: persist the Stopped state, then cancel the
    /// worker so it exits without waiting out its current sleep.
    pub async fn stop(&self, monitor_id: &str) -> Result<()> {
        self.ctx
            .store
            .transition(monitor_id, Lifecycle::Stopped)
            .await?;
        if let Some(handle) = self.registry.lock().expect("registry lock").get(monitor_id) {
            let _ = handle.cancel.send(true);
        }
        Ok(())
    }

    /// Start workers for Active monitors that don't have one yet (e.g.
    /// created by another process since the last scan). Safe to call on a
    /// timer: `start` is idempotent.
    pub async fn reconcile(&self) -> Result<usize> {
        let ids = self.ctx.store.active_monitor_ids().await?;
        let mut started = 0;
        for id in &ids {
            if self.start(id) {
                started += 1;
            }
        }
        if started > 0 {
            tracing::info!("picked up {started} new monitor(s)");
        }
        Ok(started)
    }

    /// Cancel every worker and wait for them to finish.
    pub async fn shutdown(self) {
        let handles: Vec<(String, WorkerHandle)> = self
            .registry
            .lock()
            .expect("registry lock")
            .drain()
            .collect();
        for (_, handle) in &handles {
            let _ = handle.cancel.send(true);
        }
        for (id, handle) in handles {
            if handle.join.await.is_err() {
                tracing::warn!(monitor_id = %id, "worker task panicked");
            }
        }
        tracing::info!("supervisor shut down");
    }

    pub fn worker_count(&self) -> usize {
        self.registry.lock().expect("registry lock").len()
    }

    pub fn is_running(&self, monitor_id: &str) -> bool {
        self.registry
            .lock()
            .expect("registry lock")
            .contains_key(monitor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dispatcher;
    use crate::testsupport::{
        Fetch, MockStore, RecordingMailer, RecordingMessenger, ScriptedFetcher,
        in_stock_snapshot, out_of_stock_snapshot,
    };
    use shopwatch_core::config::EngineConfig;
    use shopwatch_core::traits::EntityStore;
    use shopwatch_core::types::{Conditions, Monitor, Recipient};
    use std::time::Duration;

    fn stock_only() -> Conditions {
        Conditions {
            stock: true,
            ..Default::default()
        }
    }

    /// Long poll interval so never-satisfied workers stay parked in their
    /// first sleep for the duration of a test.
    fn parked_timing() -> EngineConfig {
        EngineConfig {
            poll_interval_secs: 3600,
            backoff_interval_secs: 3600,
            fetch_timeout_secs: 1,
            reconcile_interval_secs: 1,
        }
    }

    fn supervisor_with(store: Arc<MockStore>, script: Vec<Fetch>) -> Supervisor {
        let ctx = Arc::new(EngineCtx {
            store,
            fetcher: Arc::new(ScriptedFetcher::new(script)),
            dispatcher: Dispatcher::new(
                Arc::new(RecordingMailer::working()),
                Arc::new(RecordingMessenger::working()),
            ),
            timing: parked_timing(),
        });
        Supervisor::new(ctx)
    }

    fn seeded_store() -> (Arc<MockStore>, String) {
        let recipient = Recipient::new(Some("a@example.com".into()), None, false);
        let monitor = Monitor::new(&recipient.id, "https://shop.example/x", stock_only());
        let id = monitor.id.clone();
        (Arc::new(MockStore::with(monitor, recipient)), id)
    }

    async fn wait_until(deadline_ms: u64, mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..deadline_ms {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        check()
    }

    #[tokio::test]
    async fn double_start_is_a_noop() {
        let (store, id) = seeded_store();
        let supervisor = supervisor_with(store, vec![Fetch::Ok(out_of_stock_snapshot())]);

        assert!(supervisor.start(&id));
        assert!(!supervisor.start(&id));
        assert_eq!(supervisor.worker_count(), 1);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn start_all_covers_active_monitors() {
        let (store, _first) = seeded_store();
        let recipient = Recipient::new(Some("b@example.com".into()), None, false);
        store.create_recipient(&recipient).await.unwrap();
        store.insert_monitor(Monitor::new(
            &recipient.id,
            "https://shop.example/y",
            stock_only(),
        ));

        let supervisor =
            supervisor_with(store.clone(), vec![Fetch::Ok(out_of_stock_snapshot())]);
        assert_eq!(supervisor.start_all().await.unwrap(), 2);
        assert_eq!(supervisor.worker_count(), 2);
        // second sweep finds nothing new
        assert_eq!(supervisor.start_all().await.unwrap(), 0);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn satisfied_worker_deregisters_itself() {
        let (store, id) = seeded_store();
        let supervisor = supervisor_with(store.clone(), vec![Fetch::Ok(in_stock_snapshot())]);

        supervisor.start(&id);
        assert!(
            wait_until(1000, || supervisor.worker_count() == 0).await,
            "worker did not deregister"
        );
        assert_eq!(store.state_of(&id), Some(Lifecycle::Satisfied));
        assert!(!supervisor.is_running(&id));

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn stop_persists_and_cancels() {
        let (store, id) = seeded_store();
        let supervisor =
            supervisor_with(store.clone(), vec![Fetch::Ok(out_of_stock_snapshot())]);

        supervisor.start(&id);
        supervisor.stop(&id).await.unwrap();

        assert_eq!(store.state_of(&id), Some(Lifecycle::Stopped));
        assert!(
            wait_until(1000, || supervisor.worker_count() == 0).await,
            "worker did not exit after stop"
        );

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn reconcile_picks_up_new_monitors() {
        let (store, id) = seeded_store();
        let supervisor =
            supervisor_with(store.clone(), vec![Fetch::Ok(out_of_stock_snapshot())]);
        supervisor.start(&id);

        let recipient = Recipient::new(Some("c@example.com".into()), None, false);
        store.create_recipient(&recipient).await.unwrap();
        store.insert_monitor(Monitor::new(
            &recipient.id,
            "https://shop.example/z",
            stock_only(),
        ));

        assert_eq!(supervisor.reconcile().await.unwrap(), 1);
        assert_eq!(supervisor.worker_count(), 2);

        supervisor.shutdown().await;
    }
}
