//! bottlemail - mail to your future self.
//!
//! A bottle is a message submitted now and mailed back to its sender at a
//! chosen future time, once the sender has confirmed their address through
//! a link. Submission and confirmation are served over HTTP; a background
//! reconciler delivers confirmed bottles whose time has come.

pub mod bottle;
pub mod config;
pub mod datetime;
pub mod db;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod mailer;
pub mod web;

pub use bottle::{
    Bottle, BottleRepository, BottleService, BottleSettings, BottleStatus, ConfirmOutcome,
    NewBottle,
};
pub use config::Config;
pub use db::{Database, SharedDatabase};
pub use delivery::{start_reconciler, DeliveryReconciler, SweepReport};
pub use error::{BottleError, Result};
pub use mailer::{build_mailer, Envelope, Mailer, SharedMailer};
pub use web::WebServer;
