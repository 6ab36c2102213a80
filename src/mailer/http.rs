//! HTTP mail provider client (SendGrid v3 `mail/send` API).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::{Envelope, Mailer, Sender};
use crate::config::MailConfig;
use crate::{BottleError, Result};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// User agent string for provider requests.
const USER_AGENT: &str = "bottlemail/0.1";

/// Maximum number of provider error body bytes kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: &'a Sender,
    subject: &'a str,
    content: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

impl<'a> SendRequest<'a> {
    fn from_envelope(envelope: &'a Envelope) -> Self {
        Self {
            personalizations: [Personalization {
                to: [Address {
                    email: &envelope.to,
                }],
            }],
            from: &envelope.from,
            subject: &envelope.subject,
            content: [Content {
                kind: "text/html",
                value: &envelope.html,
            }],
        }
    }
}

/// Mailer posting JSON to an HTTP mail provider.
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpMailer {
    /// Create a new provider client from configuration.
    pub fn new(config: &MailConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BottleError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn deliver(&self, envelope: &Envelope) -> Result<()> {
        debug!(to = %envelope.to, subject = %envelope.subject, "Posting mail to provider");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&SendRequest::from_envelope(envelope))
            .send()
            .await
            .map_err(|e| BottleError::DeliveryFailure(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        warn!(status = %status, "Mail provider rejected message");
        Err(BottleError::DeliveryFailure(format!(
            "HTTP {}: {}",
            status, body
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> Envelope {
        Envelope {
            to: "a@x.com".to_string(),
            from: Sender {
                email: "noreply@bottle.email".to_string(),
                name: "bottle.email".to_string(),
            },
            subject: "Confirm your bottle.email".to_string(),
            html: "<p>hi</p>".to_string(),
        }
    }

    #[test]
    fn test_send_request_shape() {
        let envelope = envelope();
        let json = serde_json::to_value(SendRequest::from_envelope(&envelope)).unwrap();

        assert_eq!(json["personalizations"][0]["to"][0]["email"], "a@x.com");
        assert_eq!(json["from"]["email"], "noreply@bottle.email");
        assert_eq!(json["from"]["name"], "bottle.email");
        assert_eq!(json["subject"], "Confirm your bottle.email");
        assert_eq!(json["content"][0]["type"], "text/html");
        assert_eq!(json["content"][0]["value"], "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_delivery_failure() {
        let config = MailConfig {
            provider: "sendgrid".to_string(),
            api_key: "SG.test".to_string(),
            api_url: "http://127.0.0.1:1/v3/mail/send".to_string(),
            timeout_secs: 2,
            ..MailConfig::default()
        };
        let mailer = HttpMailer::new(&config).unwrap();

        let result = mailer.deliver(&envelope()).await;
        assert!(matches!(result, Err(BottleError::DeliveryFailure(_))));
    }
}
