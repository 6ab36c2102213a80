//! Periodic delivery sweep.
//!
//! Each sweep rediscovers its work from the database: abandoned `sending`
//! claims under the retry cap, then `pending` bottles whose send time has
//! passed. Claimed bottles are mailed through a bounded pool and marked
//! `complete` only once the mailer accepted them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::bottle::{Bottle, BottleRepository};
use crate::config::{MailConfig, ReconcilerConfig};
use crate::db::SharedDatabase;
use crate::mailer::templates::delivery_envelope;
use crate::mailer::SharedMailer;
use crate::Result;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Due `pending` bottles claimed.
    pub claimed: usize,
    /// Stale `sending` bottles claimed again.
    pub reclaimed: usize,
    /// Bottles the mailer accepted and that were marked complete.
    pub delivered: usize,
    /// Bottles the mailer rejected.
    pub failed: usize,
    /// Whether the sweep hit its wall-clock ceiling.
    pub timed_out: bool,
}

impl SweepReport {
    /// Whether the sweep found nothing to do.
    pub fn is_idle(&self) -> bool {
        self.claimed == 0 && self.reclaimed == 0
    }
}

/// Counters shared by concurrent dispatches, readable after a timeout.
#[derive(Default)]
struct Tally {
    claimed: AtomicUsize,
    reclaimed: AtomicUsize,
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    fn report(&self, timed_out: bool) -> SweepReport {
        SweepReport {
            claimed: self.claimed.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out,
        }
    }
}

/// Sweep start time as seen by the database, advanced by real elapsed time.
#[derive(Clone, Copy)]
struct SweepClock {
    start: DateTime<Utc>,
    started: Instant,
}

impl SweepClock {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            started: Instant::now(),
        }
    }

    /// Current time on the sweep's clock.
    fn now(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.started.elapsed())
            .ok()
            .and_then(|elapsed| self.start.checked_add_signed(elapsed))
            .unwrap_or(self.start)
    }
}

/// Oldest claim time that still counts as live, or `None` when the window
/// reaches past the representable range and nothing can be stale.
fn stale_cutoff(now: DateTime<Utc>, stale_after_secs: u64) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(Duration::from_secs(stale_after_secs))
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
}

/// Background task delivering due bottles.
pub struct DeliveryReconciler {
    db: SharedDatabase,
    mailer: SharedMailer,
    mail: MailConfig,
    config: ReconcilerConfig,
}

impl DeliveryReconciler {
    /// Create a new reconciler.
    pub fn new(
        db: SharedDatabase,
        mailer: SharedMailer,
        mail: MailConfig,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            db,
            mailer,
            mail,
            config,
        }
    }

    /// Time between sweeps.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    /// Run the sweep loop forever.
    ///
    /// Sweeps never overlap within one loop; ticks missed while a sweep
    /// was running are skipped rather than fired back to back.
    pub async fn run(&self) {
        info!(
            interval_secs = self.config.interval_secs,
            batch_size = self.config.batch_size,
            max_concurrency = self.config.max_concurrency,
            "Delivery reconciler started"
        );

        let mut timer = interval(self.interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            if let Err(e) = self.sweep().await {
                error!("Delivery sweep failed: {}", e);
            }
        }
    }

    /// Sweep as of the current time.
    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep as of `now`.
    ///
    /// A sweep exceeding `sweep_timeout_secs` is abandoned. Bottles it had
    /// claimed stay `sending` and come back through the stale rule.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let tally = Tally::default();
        let ceiling = Duration::from_secs(self.config.sweep_timeout_secs);

        let report = match tokio::time::timeout(ceiling, self.sweep_inner(now, &tally)).await {
            Ok(Ok(())) => tally.report(false),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(
                    timeout_secs = self.config.sweep_timeout_secs,
                    "Delivery sweep abandoned after timeout"
                );
                tally.report(true)
            }
        };

        if report.is_idle() {
            debug!("No bottles due");
        } else {
            info!(
                claimed = report.claimed,
                reclaimed = report.reclaimed,
                delivered = report.delivered,
                failed = report.failed,
                timed_out = report.timed_out,
                "Delivery sweep finished"
            );
        }
        Ok(report)
    }

    async fn sweep_inner(&self, now: DateTime<Utc>, tally: &Tally) -> Result<()> {
        let repo = BottleRepository::new(self.db.pool());
        let batch_size = self.config.batch_size;
        let clock = SweepClock::new(now);

        // Stale claims go first so this sweep's own fresh claims are never
        // mistaken for abandoned ones.
        if let Some(stale_before) = stale_cutoff(now, self.config.stale_after_secs) {
            loop {
                let batch = repo
                    .claim_stale(now, stale_before, self.config.max_attempts, batch_size)
                    .await?;
                let count = batch.len();
                if count > 0 {
                    info!(count, "Reclaimed stale bottles");
                }
                tally.reclaimed.fetch_add(count, Ordering::Relaxed);
                self.dispatch_all(batch, clock, tally).await;
                if count < batch_size as usize {
                    break;
                }
            }
        }

        loop {
            let batch = repo.claim_due(now, batch_size).await?;
            let count = batch.len();
            tally.claimed.fetch_add(count, Ordering::Relaxed);
            self.dispatch_all(batch, clock, tally).await;
            if count < batch_size as usize {
                break;
            }
        }

        Ok(())
    }

    async fn dispatch_all(&self, bottles: Vec<Bottle>, clock: SweepClock, tally: &Tally) {
        if bottles.is_empty() {
            return;
        }
        stream::iter(bottles)
            .for_each_concurrent(self.config.max_concurrency, |bottle| {
                self.dispatch(bottle, clock, tally)
            })
            .await;
    }

    /// Mail one claimed bottle and settle its row.
    async fn dispatch(&self, bottle: Bottle, clock: SweepClock, tally: &Tally) {
        let repo = BottleRepository::new(self.db.pool());
        let envelope = delivery_envelope(&self.mail, &bottle);

        match self.mailer.deliver(&envelope).await {
            Ok(()) => match repo.mark_complete(&bottle.id, clock.now()).await {
                Ok(true) => {
                    tally.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(bottle_id = %bottle.id, "Bottle delivered");
                }
                Ok(false) => {
                    warn!(bottle_id = %bottle.id, "Delivered bottle was no longer sending");
                }
                Err(e) => {
                    error!(
                        bottle_id = %bottle.id,
                        "Bottle delivered but could not be marked complete: {}", e
                    );
                }
            },
            Err(e) => {
                tally.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    bottle_id = %bottle.id,
                    attempts = bottle.attempts,
                    "Bottle delivery failed: {}", e
                );
                if let Err(err) = repo.record_failure(&bottle.id, &e.to_string()).await {
                    error!(bottle_id = %bottle.id, "Failed to record delivery error: {}", err);
                }
            }
        }
    }
}

/// Start the reconciler as a background task.
pub fn start_reconciler(
    db: SharedDatabase,
    mailer: SharedMailer,
    mail: MailConfig,
    config: ReconcilerConfig,
) -> JoinHandle<()> {
    let reconciler = Arc::new(DeliveryReconciler::new(db, mailer, mail, config));
    tokio::spawn(async move {
        reconciler.run().await;
    })
}
