//! Mailer that only logs, for local runs without a provider account.

use async_trait::async_trait;
use tracing::info;

use super::{Envelope, Mailer};
use crate::Result;

/// Logs each envelope instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, envelope: &Envelope) -> Result<()> {
        info!(
            to = %envelope.to,
            from = %envelope.from.email,
            subject = %envelope.subject,
            "Mail not sent (log provider)"
        );
        tracing::debug!(html = %envelope.html, "Mail body");
        Ok(())
    }
}
