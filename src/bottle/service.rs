//! Bottle lifecycle: submission and confirmation.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use validator::ValidateEmail;

use super::repository::BottleRepository;
use super::types::{Bottle, ConfirmOutcome, NewBottle};
use crate::config::{Config, MailConfig};
use crate::datetime::parse_send_time;
use crate::db::SharedDatabase;
use crate::mailer::templates::{confirmation_envelope, confirmation_link};
use crate::mailer::SharedMailer;
use crate::{BottleError, Result};

/// Settings the lifecycle needs from the configuration.
#[derive(Debug, Clone)]
pub struct BottleSettings {
    /// Maximum outstanding unconfirmed bottles per address.
    pub max_unconfirmed: i64,
    /// Maximum message length in characters.
    pub max_text_length: usize,
    /// Base URL of the confirmation endpoint.
    pub confirm_base_url: String,
    /// Sender identity and provider settings.
    pub mail: MailConfig,
}

impl BottleSettings {
    /// Extract the lifecycle settings from the full configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_unconfirmed: config.limits.max_unconfirmed,
            max_text_length: config.limits.max_text_length,
            confirm_base_url: config.confirm.base_url.clone(),
            mail: config.mail.clone(),
        }
    }
}

impl Default for BottleSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Creates and confirms bottles.
#[derive(Clone)]
pub struct BottleService {
    db: SharedDatabase,
    mailer: SharedMailer,
    settings: BottleSettings,
}

impl BottleService {
    /// Create a new service over the given store and mailer.
    pub fn new(db: SharedDatabase, mailer: SharedMailer, settings: BottleSettings) -> Self {
        Self {
            db,
            mailer,
            settings,
        }
    }

    /// Get a bottle by id.
    pub async fn get(&self, id: &str) -> Result<Option<Bottle>> {
        BottleRepository::new(self.db.pool()).get_by_id(id).await
    }

    /// Submit a new bottle. See [`BottleService::submit_at`].
    pub async fn submit(&self, email: &str, text: &str, send_at_raw: &str) -> Result<String> {
        self.submit_at(email, text, send_at_raw, Utc::now()).await
    }

    /// Submit a new bottle as of `now` and mail its confirmation link.
    ///
    /// Returns the new bottle's id. If the confirmation mail cannot be sent
    /// the bottle is still stored, unconfirmed, and the mail error is
    /// returned.
    pub async fn submit_at(
        &self,
        email: &str,
        text: &str,
        send_at_raw: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let email = email.trim();
        if email.is_empty() || text.trim().is_empty() || send_at_raw.trim().is_empty() {
            return Err(BottleError::InvalidArgument(
                "email, text and time are required".to_string(),
            ));
        }
        if !email.validate_email() {
            return Err(BottleError::InvalidArgument(
                "email is not a valid address".to_string(),
            ));
        }
        if text.chars().count() > self.settings.max_text_length {
            return Err(BottleError::InvalidArgument(format!(
                "text is longer than {} characters",
                self.settings.max_text_length
            )));
        }

        let send_at = parse_send_time(send_at_raw).ok_or_else(|| {
            BottleError::InvalidArgument("time is not a recognised timestamp".to_string())
        })?;
        if send_at <= now {
            return Err(BottleError::InvalidTime);
        }

        let repo = BottleRepository::new(self.db.pool());

        let new_bottle = NewBottle::new(email, text, send_at, now);
        let Some(bottle) = repo
            .create_capped(&new_bottle, self.settings.max_unconfirmed)
            .await?
        else {
            info!(
                max_unconfirmed = self.settings.max_unconfirmed,
                "Submission refused: too many unconfirmed bottles"
            );
            return Err(BottleError::RateLimited);
        };
        info!(bottle_id = %bottle.id, send_at = %bottle.send_at, "Bottle created");

        let link = confirmation_link(&self.settings.confirm_base_url, &bottle.id)?;
        let envelope = confirmation_envelope(&self.settings.mail, &bottle, &link);
        if let Err(e) = self.mailer.deliver(&envelope).await {
            warn!(
                bottle_id = %bottle.id,
                error = %e,
                "Confirmation mail failed; bottle stays unconfirmed"
            );
            return Err(e);
        }

        Ok(bottle.id)
    }

    /// Confirm a bottle. See [`BottleService::confirm_at`].
    pub async fn confirm(&self, id: &str) -> Result<ConfirmOutcome> {
        self.confirm_at(id, Utc::now()).await
    }

    /// Follow a confirmation link as of `now`.
    ///
    /// Holding the id is the only credential. Only `unconfirmed` bottles
    /// change; confirming again is a no-op that reports the stored bottle.
    pub async fn confirm_at(&self, id: &str, now: DateTime<Utc>) -> Result<ConfirmOutcome> {
        let id = id.trim();
        if id.is_empty() {
            return Err(BottleError::InvalidArgument("id is required".to_string()));
        }

        let repo = BottleRepository::new(self.db.pool());

        if let Some(bottle) = repo.confirm(id, now).await? {
            info!(bottle_id = %bottle.id, "Bottle confirmed");
            return Ok(ConfirmOutcome::Confirmed(bottle));
        }

        match repo.get_by_id(id).await? {
            Some(bottle) => {
                info!(
                    bottle_id = %bottle.id,
                    status = %bottle.status,
                    sent = bottle.is_sent(),
                    "Bottle already confirmed"
                );
                Ok(ConfirmOutcome::AlreadyConfirmed(bottle))
            }
            None => Err(BottleError::NotFound("bottle".to_string())),
        }
    }
}
