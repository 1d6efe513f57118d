//! ShopWatch configuration system.
//!
//! TOML file at `~/.shopwatch/config.toml`; every field has a default so a
//! missing file still yields a working (if channel-less) setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ShopWatchError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopWatchConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "~/.shopwatch/shopwatch.db".into()
}

impl Default for ShopWatchConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            smtp: SmtpConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            db_path: default_db_path(),
        }
    }
}

impl ShopWatchConfig {
    /// Load config from the default path (~/.shopwatch/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ShopWatchError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ShopWatchError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ShopWatchError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".shopwatch")
    }
}

/// Worker timing. Backoff is deliberately shorter than the poll interval:
/// a transient fetch failure should be retried sooner than a healthy
/// not-yet-satisfied check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between checks when the listing was fetched successfully.
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
    /// Seconds to wait before retrying after a fetch failure.
    #[serde(default = "default_backoff_secs")]
    pub backoff_interval_secs: u64,
    /// Hard bound on a single fetch call.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Seconds between supervisor rescans for newly created monitors.
    #[serde(default = "default_reconcile_secs")]
    pub reconcile_interval_secs: u64,
}

fn default_poll_secs() -> u64 {
    300
}
fn default_backoff_secs() -> u64 {
    60
}
fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_reconcile_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_secs(),
            backoff_interval_secs: default_backoff_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            reconcile_interval_secs: default_reconcile_secs(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn backoff_interval(&self) -> Duration {
        Duration::from_secs(self.backoff_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

/// SMTP (primary channel) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            display_name: None,
        }
    }
}

/// WhatsApp gateway (secondary channel) configuration.
///
/// The gateway's endpoint addressing is unreliable, so the sender address is
/// resolved by trying `sender_candidates` in order until one succeeds. The
/// defaults reflect the gateway's known sandbox numbers; override them when
/// a dedicated WhatsApp-enabled number is provisioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// The account's own configured phone number, if any.
    #[serde(default)]
    pub from_number: String,
    /// Sender address formats tried in priority order.
    #[serde(default = "default_sender_candidates")]
    pub sender_candidates: Vec<String>,
}

fn default_sender_candidates() -> Vec<String> {
    vec![
        // Gateway sandbox number (most common setup)
        "whatsapp:+14155238886".into(),
        // The account's own WhatsApp-enabled number
        "whatsapp:{from}".into(),
        // Alternative sandbox number
        "whatsapp:+15017122661".into(),
        // Raw configured number, no whatsapp: prefix
        "{from}".into(),
    ]
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            sender_candidates: default_sender_candidates(),
        }
    }
}
