//! Condition evaluation — a pure function of (conditions, snapshot).
//!
//! A monitor is satisfied when ANY enabled condition holds; reasons are
//! accumulated in a fixed order (stock, size, delivery, price) so repeated
//! evaluations of the same inputs produce identical output.

use std::sync::LazyLock;

use regex::Regex;

use shopwatch_core::types::{Availability, Conditions, Snapshot};

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d,]+\.?\d*").expect("number regex"));

/// Result of evaluating one snapshot against one monitor's conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub satisfied: bool,
    /// One human-readable fact per satisfied condition, or a single
    /// "not yet met" line.
    pub reasons: Vec<String>,
}

impl Verdict {
    /// Compact status line persisted on the monitor after each check.
    pub fn status_line(&self) -> String {
        self.reasons.join(" ")
    }
}

/// Evaluate a monitor's conditions against the latest snapshot.
pub fn evaluate(conditions: &Conditions, snapshot: &Snapshot) -> Verdict {
    let mut reasons = Vec::new();

    if conditions.stock && snapshot.availability == Availability::InStock {
        reasons.push("✅ Product is now in stock!".to_string());
    }

    // Exact, case-sensitive membership: "M" does not match "m" or "Medium".
    if let Some(size) = &conditions.size
        && snapshot.sizes.iter().any(|s| s == size)
    {
        reasons.push(format!("✅ Size {size} is available!"));
    }

    // Loose text heuristic, best-effort only: shops rarely expose delivery
    // state in structured form, so any mention of "available"/"delivery"
    // counts. Not a guarantee of real delivery availability.
    if conditions.delivery
        && let Some(text) = &snapshot.delivery_text
    {
        let lower = text.to_lowercase();
        if lower.contains("available") || lower.contains("delivery") {
            reasons.push("✅ Delivery is available!".to_string());
        }
    }

    if let Some(target) = conditions.price
        && let Some(text) = &snapshot.price_text
        && let Some(price) = parse_price(text)
        && price <= target
    {
        reasons.push(format!("✅ Price dropped to {text} (target: {target})"));
    }

    if reasons.is_empty() {
        Verdict {
            satisfied: false,
            reasons: vec!["Conditions not yet met".to_string()],
        }
    } else {
        Verdict {
            satisfied: true,
            reasons,
        }
    }
}

/// Extract a numeric price from raw price text like "₹1,299.00" or "$45".
pub fn parse_price(text: &str) -> Option<f64> {
    let m = NUMBER_RE.find(text)?;
    m.as_str().replace(',', "").parse().ok()
}
