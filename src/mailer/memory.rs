//! In-memory mailer that records envelopes. Used by tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Envelope, Mailer};
use crate::{BottleError, Result};

/// Records every delivered envelope; can be switched to fail.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Envelope>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    /// Create a mailer that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All envelopes delivered so far.
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Envelopes delivered to one address.
    pub fn sent_to(&self, address: &str) -> Vec<Envelope> {
        self.sent()
            .into_iter()
            .filter(|e| e.to == address)
            .collect()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn deliver(&self, envelope: &Envelope) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BottleError::DeliveryFailure(
                "memory mailer set to fail".to_string(),
            ));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(envelope.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::Sender;

    fn envelope(to: &str) -> Envelope {
        Envelope {
            to: to.to_string(),
            from: Sender {
                email: "noreply@bottle.email".to_string(),
                name: "bottle.email".to_string(),
            },
            subject: "subject".to_string(),
            html: "<p>body</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_records_envelopes() {
        let mailer = MemoryMailer::new();
        mailer.deliver(&envelope("a@x.com")).await.unwrap();
        mailer.deliver(&envelope("b@x.com")).await.unwrap();

        assert_eq!(mailer.sent().len(), 2);
        assert_eq!(mailer.sent_to("a@x.com").len(), 1);
    }

    #[tokio::test]
    async fn test_failing_records_nothing() {
        let mailer = MemoryMailer::new();
        mailer.set_failing(true);

        let result = mailer.deliver(&envelope("a@x.com")).await;
        assert!(matches!(result, Err(BottleError::DeliveryFailure(_))));
        assert!(mailer.sent().is_empty());

        mailer.set_failing(false);
        mailer.deliver(&envelope("a@x.com")).await.unwrap();
        assert_eq!(mailer.sent().len(), 1);
    }
}
