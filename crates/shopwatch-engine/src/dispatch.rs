//! Notification dispatch across the recipient's channels.
//!
//! Email is the primary channel: attempted whenever the recipient has an
//! address and credentials exist. WhatsApp is secondary: attempted only
//! when the recipient opted in and left a phone number. A primary failure
//! never blocks the secondary attempt, and nothing is retried — the caller
//! ends monitoring after one dispatch either way.
//!
//! Success means the channel confirmed delivery. Channels that were never
//! attempted (no address, no credentials) produce no outcome at all, so the
//! audit trail only ever shows real attempts.

use std::sync::Arc;

use shopwatch_core::traits::{Mailer, Messenger};
use shopwatch_core::types::{ChannelKind, Conditions, DeliveryOutcome, Recipient};

/// One attempted channel, with what the channel reported.
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub channel: ChannelKind,
    pub outcome: DeliveryOutcome,
    /// Error detail on failure; logged and recorded, never surfaced.
    pub detail: Option<String>,
}

/// Per-channel outcomes of one dispatch call.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn delivered_any(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.outcome == DeliveryOutcome::Delivered)
    }
}

/// Routes one message to a recipient's configured channels.
pub struct Dispatcher {
    mailer: Arc<dyn Mailer>,
    messenger: Arc<dyn Messenger>,
}

impl Dispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, messenger: Arc<dyn Messenger>) -> Self {
        Self { mailer, messenger }
    }

    /// Attempt delivery on every eligible channel. Returns one outcome per
    /// attempted channel; skipped channels are absent.
    pub async fn dispatch(
        &self,
        recipient: &Recipient,
        subject: &str,
        message: &str,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        match &recipient.email {
            Some(address) if self.mailer.is_configured() => {
                let outcome = match self.mailer.send(address, subject, message).await {
                    Ok(()) => ChannelOutcome {
                        channel: ChannelKind::Email,
                        outcome: DeliveryOutcome::Delivered,
                        detail: None,
                    },
                    Err(e) => {
                        tracing::warn!(recipient = %recipient.id, "email delivery failed: {e}");
                        ChannelOutcome {
                            channel: ChannelKind::Email,
                            outcome: DeliveryOutcome::Failed,
                            detail: Some(e.to_string()),
                        }
                    }
                };
                report.outcomes.push(outcome);
            }
            Some(_) => {
                tracing::warn!(
                    recipient = %recipient.id,
                    "email address present but SMTP credentials missing, skipping"
                );
            }
            None => {}
        }

        if recipient.whatsapp_opt_in
            && let Some(phone) = &recipient.phone
        {
            if self.messenger.is_configured() {
                let outcome = match self.messenger.send(phone, message).await {
                    Ok(()) => ChannelOutcome {
                        channel: ChannelKind::WhatsApp,
                        outcome: DeliveryOutcome::Delivered,
                        detail: None,
                    },
                    Err(e) => {
                        tracing::warn!(recipient = %recipient.id, "whatsapp delivery failed: {e}");
                        ChannelOutcome {
                            channel: ChannelKind::WhatsApp,
                            outcome: DeliveryOutcome::Failed,
                            detail: Some(e.to_string()),
                        }
                    }
                };
                report.outcomes.push(outcome);
            } else {
                tracing::warn!(
                    recipient = %recipient.id,
                    "whatsapp opted in but gateway credentials missing, skipping"
                );
            }
        }

        report
    }

    /// Monitoring-started confirmation. Best-effort: outcomes are logged
    /// but not written to the audit trail, which tracks alert dispatches.
    pub async fn send_confirmation(
        &self,
        recipient: &Recipient,
        product_name: &str,
        conditions: &Conditions,
    ) -> DispatchReport {
        let message = compose_confirmation(product_name, conditions);
        self.dispatch(recipient, "ShopWatch - Monitoring Started", &message)
            .await
    }
}

/// Alert body: product headline plus one line per satisfied condition.
pub fn compose_alert(product_name: &str, reasons: &[String]) -> String {
    format!("Good news about {product_name}!\n\n{}", reasons.join("\n"))
}

/// Confirmation body sent when monitoring begins.
pub fn compose_confirmation(product_name: &str, conditions: &Conditions) -> String {
    format!(
        "🛍️ ShopWatch Monitoring Started!\n\n\
         Product: {product_name}\n\n\
         Monitoring for: {}\n\n\
         We'll notify you as soon as your conditions are met.",
        conditions.summary()
    )
}
