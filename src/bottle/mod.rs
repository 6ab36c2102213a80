//! Bottles: messages held until a future send time.
//!
//! A bottle is created `unconfirmed`, becomes `pending` when its sender
//! follows the confirmation link, `sending` when a sweep claims it, and
//! `complete` once the mail provider accepted it.

mod repository;
mod service;
mod types;

pub use repository::BottleRepository;
pub use service::{BottleService, BottleSettings};
pub use types::{Bottle, BottleStatus, ConfirmOutcome, NewBottle};
