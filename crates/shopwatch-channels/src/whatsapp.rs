//! WhatsApp channel via a Twilio-style messaging gateway.
//!
//! The gateway's sender addressing is a known quirk: depending on how the
//! account is set up, the working `From` value may be the sandbox number,
//! the account's own number with a `whatsapp:` prefix, or the raw number.
//! Rather than guessing once and failing, the sender address is resolved
//! from a configurable prioritized candidate list — the first format the
//! gateway accepts wins. Exhausting the list fails the channel.

use async_trait::async_trait;

use shopwatch_core::config::WhatsAppConfig;
use shopwatch_core::error::{Result, ShopWatchError};
use shopwatch_core::traits::Messenger;

const API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// WhatsApp messenger backed by the gateway's REST API.
pub struct WhatsAppGateway {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppGateway {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Sender addresses to try, in priority order. `{from}` placeholders are
    /// filled from the configured account number; candidates that need a
    /// number the account doesn't have are dropped.
    fn sender_addresses(&self) -> Vec<String> {
        let from_clean = normalize_number(&self.config.from_number);
        self.config
            .sender_candidates
            .iter()
            .filter_map(|template| {
                if template.contains("{from}") {
                    if from_clean.is_empty() {
                        None
                    } else {
                        Some(template.replace("{from}", &format!("+{from_clean}")))
                    }
                } else {
                    Some(template.clone())
                }
            })
            .collect()
    }

    async fn post_message(&self, from: &str, to: &str, body: &str) -> Result<()> {
        let url = format!(
            "{API_BASE}/Accounts/{}/Messages.json",
            self.config.account_sid
        );
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await
            .map_err(|e| ShopWatchError::Channel(format!("Gateway request: {e}")))?;

        if response.status().is_success() {
            let result: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ShopWatchError::Channel(format!("Gateway response: {e}")))?;
            let sid = result["sid"].as_str().unwrap_or("unknown");
            tracing::debug!(sid, from, "WhatsApp message accepted");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(ShopWatchError::Channel(format!(
                "Gateway error {status}: {text}"
            )))
        }
    }
}

#[async_trait]
impl Messenger for WhatsAppGateway {
    fn is_configured(&self) -> bool {
        !self.config.account_sid.is_empty() && !self.config.auth_token.is_empty()
    }

    async fn send(&self, to: &str, body: &str) -> Result<()> {
        if !self.is_configured() {
            return Err(ShopWatchError::Channel(
                "WhatsApp gateway credentials not configured".into(),
            ));
        }

        let to_clean = normalize_number(to);
        if to_clean.is_empty() {
            return Err(ShopWatchError::Channel("Empty recipient number".into()));
        }
        let to_addr = format!("whatsapp:+{to_clean}");

        let mut last_error = ShopWatchError::Channel("No sender candidates".into());
        for from in self.sender_addresses() {
            match self.post_message(&from, &to_addr, body).await {
                Ok(()) => {
                    tracing::info!("📱 WhatsApp message sent via sender {from}");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(sender = %from, "WhatsApp sender format rejected: {e}");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

/// Strip punctuation from a phone number and default to a US country code
/// for bare 10-digit numbers, matching what the gateway expects.
pub fn normalize_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 && !digits.starts_with('1') {
        format!("1{digits}")
    } else {
        digits
    }
}
