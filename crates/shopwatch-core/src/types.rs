//! Core data model: monitors, recipients, snapshots, notification records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a monitor.
///
/// `Active` monitors have a live worker; `Satisfied` and `Stopped` are
/// terminal. A notification attempt (delivered or not) moves the monitor to
/// `Satisfied` — this is a one-shot design, not retry-until-delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Satisfied,
    Stopped,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Active => "active",
            Lifecycle::Satisfied => "satisfied",
            Lifecycle::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Lifecycle::Active),
            "satisfied" => Some(Lifecycle::Satisfied),
            "stopped" => Some(Lifecycle::Stopped),
            _ => None,
        }
    }
}

/// What the user wants to be told about.
///
/// A predicate is enabled when its flag is true (stock, delivery) or its
/// parameter is present (size, price). At least one must be enabled at
/// creation — enforced by whoever creates the monitor, not by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// Notify when the product is back in stock.
    #[serde(default)]
    pub stock: bool,
    /// Notify when this exact size string becomes available.
    #[serde(default)]
    pub size: Option<String>,
    /// Notify when delivery looks available (best-effort text heuristic).
    #[serde(default)]
    pub delivery: bool,
    /// Notify when the parsed price drops to or below this target.
    #[serde(default)]
    pub price: Option<f64>,
}

impl Conditions {
    pub fn any_enabled(&self) -> bool {
        self.stock || self.size.is_some() || self.delivery || self.price.is_some()
    }

    /// Human-readable summary, used in confirmation messages and listings.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.stock {
            parts.push("Stock availability".to_string());
        }
        if let Some(size) = &self.size {
            parts.push(format!("Size: {size}"));
        }
        if self.delivery {
            parts.push("Delivery status".to_string());
        }
        if let Some(target) = self.price {
            parts.push(format!("Price drops below {target}"));
        }
        if parts.is_empty() {
            "General monitoring".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// One user's monitoring request against one listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    /// Unique id (uuid v4).
    pub id: String,
    /// Owning recipient profile.
    pub recipient_id: String,
    /// Listing locator — immutable after creation.
    pub url: String,
    /// Product name, if known (filled from the first successful snapshot).
    pub product_name: Option<String>,
    pub conditions: Conditions,
    pub state: Lifecycle,
    /// Mutated only by this monitor's own worker.
    pub last_checked: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Monitor {
    pub fn new(recipient_id: &str, url: &str, conditions: Conditions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient_id: recipient_id.to_string(),
            url: url.to_string(),
            product_name: None,
            conditions,
            state: Lifecycle::Active,
            last_checked: None,
            last_status: None,
            created_at: Utc::now(),
        }
    }

    /// Display name for messages: product name if known, else the URL.
    pub fn display_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or(&self.url)
    }
}

/// Who gets notified, and over which channels.
///
/// Email is the primary channel and is always attempted when an address is
/// present. WhatsApp is attempted only when the recipient opted in and a
/// phone number is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub whatsapp_opt_in: bool,
    pub created_at: DateTime<Utc>,
}

impl Recipient {
    pub fn new(email: Option<String>, phone: Option<String>, whatsapp_opt_in: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            phone,
            whatsapp_opt_in,
            created_at: Utc::now(),
        }
    }
}

/// Notification delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    WhatsApp,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::WhatsApp => "whatsapp",
        }
    }
}

/// Outcome of one delivery attempt on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

/// Append-only audit record: one row per dispatch attempt per channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub monitor_id: String,
    pub channel: ChannelKind,
    pub message: String,
    pub outcome: DeliveryOutcome,
    pub sent_at: DateTime<Utc>,
}

/// Stock state observed on a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    InStock,
    OutOfStock,
}

/// Point-in-time observation of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: Option<String>,
    pub availability: Availability,
    /// Available size strings, any order, exact as displayed.
    pub sizes: Vec<String>,
    /// Raw price text, e.g. "₹1,299.00". Parsed by the evaluator.
    pub price_text: Option<String>,
    /// Raw delivery text, if the listing exposes any.
    pub delivery_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_enabled_detection() {
        assert!(!Conditions::default().any_enabled());
        assert!(Conditions { stock: true, ..Default::default() }.any_enabled());
        assert!(Conditions { size: Some("M".into()), ..Default::default() }.any_enabled());
        assert!(Conditions { price: Some(99.0), ..Default::default() }.any_enabled());
    }

    #[test]
    fn conditions_summary_lists_enabled_parts() {
        let c = Conditions {
            stock: true,
            size: Some("42".into()),
            delivery: false,
            price: Some(1500.0),
        };
        let s = c.summary();
        assert!(s.contains("Stock availability"));
        assert!(s.contains("Size: 42"));
        assert!(!s.contains("Delivery"));
        assert!(s.contains("1500"));
    }

    #[test]
    fn lifecycle_roundtrip() {
        for state in [Lifecycle::Active, Lifecycle::Satisfied, Lifecycle::Stopped] {
            assert_eq!(Lifecycle::parse(state.as_str()), Some(state));
        }
        assert_eq!(Lifecycle::parse("bogus"), None);
    }
}
