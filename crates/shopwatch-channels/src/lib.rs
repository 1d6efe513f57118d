//! # ShopWatch Channels
//! Notification channel implementations.
//!
//! Email (SMTP, primary) and WhatsApp (HTTP gateway, secondary). Both are
//! thin adapters behind the `Mailer`/`Messenger` traits from core; the
//! dispatcher in the engine decides what gets attempted when.

pub mod email;
pub mod whatsapp;

pub use email::SmtpMailer;
pub use whatsapp::WhatsAppGateway;
