//! SMTP mail channel — async lettre with STARTTLS.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use shopwatch_core::config::SmtpConfig;
use shopwatch_core::error::{Result, ShopWatchError};
use shopwatch_core::traits::Mailer;

/// Sends plain-text mail through a configured SMTP relay.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn is_configured(&self) -> bool {
        !self.config.username.is_empty() && !self.config.password.is_empty()
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if !self.is_configured() {
            return Err(ShopWatchError::Channel(
                "Email credentials not configured".into(),
            ));
        }

        let from_name = self.config.display_name.as_deref().unwrap_or("ShopWatch");
        let from_mailbox: Mailbox = format!("{from_name} <{}>", self.config.username)
            .parse()
            .map_err(|e| ShopWatchError::Channel(format!("Invalid from: {e}")))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| ShopWatchError::Channel(format!("Invalid to: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ShopWatchError::Channel(format!("Build email: {e}")))?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| ShopWatchError::Channel(format!("SMTP relay: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| ShopWatchError::Channel(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {to}");
        Ok(())
    }
}
