//! Outbound mail for bottlemail.
//!
//! The service only needs "deliver this HTML mail to one address". The
//! [`Mailer`] trait is that seam; providers implement it and are injected
//! as `Arc<dyn Mailer>`.

mod http;
mod log;
mod memory;
pub mod templates;

pub use http::HttpMailer;
pub use log::LogMailer;
pub use memory::MemoryMailer;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailConfig;
use crate::{BottleError, Result};

/// Sender identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sender {
    /// Sender address.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// A single HTML mail to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Recipient address.
    pub to: String,
    /// Sender identity.
    pub from: Sender,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
}

/// Outbound mail transport.
///
/// Delivery is fire-and-forget from the provider's point of view: there is
/// no idempotency key, so calling `deliver` twice may send twice.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one envelope. Any failure is reported as
    /// [`BottleError::DeliveryFailure`].
    async fn deliver(&self, envelope: &Envelope) -> Result<()>;
}

/// Shared mailer handle.
pub type SharedMailer = Arc<dyn Mailer>;

/// Build the mailer selected by `mail.provider`.
pub fn build_mailer(config: &MailConfig) -> Result<SharedMailer> {
    match config.provider.as_str() {
        "log" => Ok(Arc::new(LogMailer)),
        "sendgrid" => Ok(Arc::new(HttpMailer::new(config)?)),
        other => Err(BottleError::Config(format!("unknown mail provider: {other}"))),
    }
}
