//! API handlers.

pub mod bottle;

pub use bottle::*;

use crate::bottle::{BottleService, BottleSettings};
use crate::db::SharedDatabase;
use crate::mailer::SharedMailer;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Bottle lifecycle.
    pub bottles: BottleService,
}

impl AppState {
    /// Create handler state over the given store and mailer.
    pub fn new(db: SharedDatabase, mailer: SharedMailer, settings: BottleSettings) -> Self {
        Self {
            bottles: BottleService::new(db, mailer, settings),
        }
    }
}
