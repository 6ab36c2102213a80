//! Bottle types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle stage of a bottle.
///
/// Transitions only move forward:
/// `Unconfirmed -> Pending -> Sending -> Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BottleStatus {
    /// Created, waiting for the sender to follow the confirmation link.
    Unconfirmed,
    /// Confirmed, waiting for its send time.
    Pending,
    /// Claimed by a sweep; dispatch in flight or failed.
    Sending,
    /// Delivered.
    Complete,
}

impl BottleStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BottleStatus::Unconfirmed => "unconfirmed",
            BottleStatus::Pending => "pending",
            BottleStatus::Sending => "sending",
            BottleStatus::Complete => "complete",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unconfirmed" => Some(BottleStatus::Unconfirmed),
            "pending" => Some(BottleStatus::Pending),
            "sending" => Some(BottleStatus::Sending),
            "complete" => Some(BottleStatus::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for BottleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message held until its send time.
#[derive(Debug, Clone, Serialize)]
pub struct Bottle {
    /// Store-generated id. Possessing it is enough to confirm the bottle.
    pub id: String,
    /// Recipient address.
    pub email: String,
    /// Message body.
    pub text: String,
    /// Lifecycle stage.
    pub status: BottleStatus,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Confirmation time.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Requested delivery time.
    pub send_at: DateTime<Utc>,
    /// Delivery time.
    pub sent_at: Option<DateTime<Utc>>,
    /// Time of the most recent dispatch claim.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Number of dispatch claims so far.
    pub attempts: i64,
    /// Last mailer failure, if any.
    pub last_error: Option<String>,
}

impl Bottle {
    /// Check whether the sender has confirmed the bottle.
    pub fn is_confirmed(&self) -> bool {
        self.status != BottleStatus::Unconfirmed
    }

    /// Check whether the bottle has been delivered.
    pub fn is_sent(&self) -> bool {
        self.status == BottleStatus::Complete
    }
}

/// New bottle for creation.
#[derive(Debug, Clone)]
pub struct NewBottle {
    /// Recipient address.
    pub email: String,
    /// Message body.
    pub text: String,
    /// Requested delivery time.
    pub send_at: DateTime<Utc>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl NewBottle {
    /// Create a new bottle submitted at `created_at`.
    pub fn new(
        email: impl Into<String>,
        text: impl Into<String>,
        send_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            email: email.into(),
            text: text.into(),
            send_at,
            created_at,
        }
    }
}

/// Result of following a confirmation link.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// The bottle moved from `unconfirmed` to `pending`.
    Confirmed(Bottle),
    /// The bottle was already past `unconfirmed`; nothing changed.
    AlreadyConfirmed(Bottle),
}

impl ConfirmOutcome {
    /// The bottle as it is now stored.
    pub fn bottle(&self) -> &Bottle {
        match self {
            ConfirmOutcome::Confirmed(b) | ConfirmOutcome::AlreadyConfirmed(b) => b,
        }
    }
}
