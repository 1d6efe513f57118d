//! Per-monitor worker loop: reload → fetch → evaluate → persist → act.
//!
//! One worker task per active monitor, started by the supervisor. A worker
//! owns all writes to its monitor row (single-writer invariant) and runs
//! until the monitor reaches a terminal state or cancellation is observed.
//! Fetch failures back off and retry; they never kill the worker. All
//! sleeps race against the cancellation channel, so shutdown latency is
//! bounded by one poll of the select, not a full interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use shopwatch_core::types::{Lifecycle, Monitor, NotificationRecord, Recipient};

use crate::EngineCtx;
use crate::dispatch::compose_alert;
use crate::evaluate::evaluate;

/// Drive one monitor until it reaches a terminal state or is cancelled.
///
/// The caller (supervisor) deregisters the worker handle once this returns.
pub async fn run_worker(ctx: Arc<EngineCtx>, monitor_id: String, mut cancel: watch::Receiver<bool>) {
    tracing::info!(monitor_id = %monitor_id, "🔎 worker started");

    loop {
        // Reload every iteration: deactivation and deletion are observed
        // here, making cancellation through the store cooperative.
        let monitor = match ctx.store.load_monitor(&monitor_id).await {
            Ok(Some(m)) if m.state == Lifecycle::Active => m,
            Ok(_) => {
                tracing::info!(monitor_id = %monitor_id, "monitor gone or no longer active, worker exiting");
                return;
            }
            Err(e) => {
                tracing::warn!(monitor_id = %monitor_id, "store read failed: {e}");
                if sleep_or_cancel(&mut cancel, ctx.timing.backoff_interval()).await {
                    return;
                }
                continue;
            }
        };

        let recipient = match ctx.store.load_recipient(&monitor.recipient_id).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                tracing::info!(monitor_id = %monitor_id, "recipient gone, worker exiting");
                return;
            }
            Err(e) => {
                tracing::warn!(monitor_id = %monitor_id, "store read failed: {e}");
                if sleep_or_cancel(&mut cancel, ctx.timing.backoff_interval()).await {
                    return;
                }
                continue;
            }
        };

        // Bound the fetch explicitly: a hung shop server must not stall
        // this worker past the configured timeout.
        let fetched = tokio::time::timeout(
            ctx.timing.fetch_timeout(),
            ctx.fetcher.fetch(&monitor.url),
        )
        .await;

        let snapshot = match fetched {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                tracing::warn!(monitor_id = %monitor_id, url = %monitor.url, "fetch failed: {e}");
                record_status(&ctx, &monitor_id, &format!("Unable to check product: {e}")).await;
                if sleep_or_cancel(&mut cancel, ctx.timing.backoff_interval()).await {
                    return;
                }
                continue;
            }
            Err(_) => {
                tracing::warn!(monitor_id = %monitor_id, url = %monitor.url, "fetch timed out");
                record_status(&ctx, &monitor_id, "Unable to check product: timed out").await;
                if sleep_or_cancel(&mut cancel, ctx.timing.backoff_interval()).await {
                    return;
                }
                continue;
            }
        };

        // Backfill the product name the first time a snapshot reveals it.
        if monitor.product_name.is_none()
            && let Some(name) = &snapshot.name
            && let Err(e) = ctx.store.update_product_name(&monitor_id, name).await
        {
            tracing::warn!(monitor_id = %monitor_id, "product name update failed: {e}");
        }

        let verdict = evaluate(&monitor.conditions, &snapshot);
        record_status(&ctx, &monitor_id, &verdict.status_line()).await;

        if verdict.satisfied {
            let product_name = snapshot
                .name
                .as_deref()
                .unwrap_or_else(|| monitor.display_name());
            notify_and_finish(&ctx, &monitor, &recipient, product_name, &verdict.reasons).await;
            return;
        }

        if sleep_or_cancel(&mut cancel, ctx.timing.poll_interval()).await {
            tracing::info!(monitor_id = %monitor_id, "worker cancelled");
            return;
        }
    }
}

/// One-shot dispatch, audit records, and the Active → Satisfied transition.
///
/// The transition happens regardless of delivery outcome: a monitor is
/// never polled again after its condition was met. A silent delivery
/// failure is visible in the audit trail, not retried.
async fn notify_and_finish(
    ctx: &EngineCtx,
    monitor: &Monitor,
    recipient: &Recipient,
    product_name: &str,
    reasons: &[String],
) {
    let subject = format!("Product Alert: {product_name}");
    let message = compose_alert(product_name, reasons);

    let report = ctx.dispatcher.dispatch(recipient, &subject, &message).await;
    for outcome in &report.outcomes {
        let record = NotificationRecord {
            monitor_id: monitor.id.clone(),
            channel: outcome.channel,
            message: message.clone(),
            outcome: outcome.outcome,
            sent_at: Utc::now(),
        };
        if let Err(e) = ctx.store.append_notification(&record).await {
            tracing::warn!(monitor_id = %monitor.id, "audit record write failed: {e}");
        }
    }

    if report.delivered_any() {
        tracing::info!(monitor_id = %monitor.id, "🔔 condition met, notification sent");
    } else {
        tracing::warn!(
            monitor_id = %monitor.id,
            "condition met but no channel confirmed delivery; monitoring still ends"
        );
    }

    if let Err(e) = ctx.store.transition(&monitor.id, Lifecycle::Satisfied).await {
        tracing::warn!(monitor_id = %monitor.id, "lifecycle transition failed: {e}");
    }
}

async fn record_status(ctx: &EngineCtx, monitor_id: &str, status: &str) {
    if let Err(e) = ctx.store.update_status(monitor_id, Utc::now(), status).await {
        tracing::warn!(monitor_id = %monitor_id, "status update failed: {e}");
    }
}

/// Sleep that loses to cancellation. Returns true when cancelled.
async fn sleep_or_cancel(cancel: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.changed() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
