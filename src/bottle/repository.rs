//! Bottle repository.
//!
//! Every mutation is a single conditional statement, so concurrent callers
//! (overlapping sweeps, repeated confirmation clicks) cannot both win the
//! same transition.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{Bottle, BottleStatus, NewBottle};
use crate::datetime::{from_db, to_db};
use crate::db::DbPool;
use crate::{BottleError, Result};

const COLUMNS: &str = "id, email, text, status, created_at, confirmed_at, send_at, sent_at, \
                       claimed_at, attempts, last_error";

/// Row type for a bottle from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct BottleRow {
    id: String,
    email: String,
    text: String,
    status: String,
    created_at: String,
    confirmed_at: Option<String>,
    send_at: String,
    sent_at: Option<String>,
    claimed_at: Option<String>,
    attempts: i64,
    last_error: Option<String>,
}

impl TryFrom<BottleRow> for Bottle {
    type Error = BottleError;

    fn try_from(row: BottleRow) -> Result<Self> {
        let corrupt = |field: &str| {
            BottleError::Database(format!("bottle {} has invalid {}", row.id, field))
        };

        Ok(Bottle {
            status: BottleStatus::from_str(&row.status).ok_or_else(|| corrupt("status"))?,
            created_at: from_db(&row.created_at).ok_or_else(|| corrupt("created_at"))?,
            send_at: from_db(&row.send_at).ok_or_else(|| corrupt("send_at"))?,
            confirmed_at: row.confirmed_at.as_deref().and_then(from_db),
            sent_at: row.sent_at.as_deref().and_then(from_db),
            claimed_at: row.claimed_at.as_deref().and_then(from_db),
            attempts: row.attempts,
            last_error: row.last_error,
            email: row.email,
            text: row.text,
            id: row.id,
        })
    }
}

fn into_bottles(rows: Vec<BottleRow>) -> Result<Vec<Bottle>> {
    rows.into_iter().map(Bottle::try_from).collect()
}

/// Repository for bottle operations.
pub struct BottleRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> BottleRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Store a new `unconfirmed` bottle and return it with its generated id.
    ///
    /// Ids are random UUIDs; they act as bearer tokens and must not be
    /// guessable.
    pub async fn create(&self, new_bottle: &NewBottle) -> Result<Bottle> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO bottles (id, email, text, status, created_at, send_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&id)
        .bind(&new_bottle.email)
        .bind(&new_bottle.text)
        .bind(BottleStatus::Unconfirmed.as_str())
        .bind(to_db(&new_bottle.created_at))
        .bind(to_db(&new_bottle.send_at))
        .execute(self.pool)
        .await
        .map_err(|e| BottleError::Database(e.to_string()))?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| BottleError::NotFound("bottle".into()))
    }

    /// Store a new `unconfirmed` bottle unless its address already has
    /// `max_unconfirmed` unconfirmed bottles.
    ///
    /// The cap check and the insert are one statement, so concurrent
    /// submissions for the same address cannot overshoot the cap. Returns
    /// `None` when the cap was reached and nothing was stored.
    pub async fn create_capped(
        &self,
        new_bottle: &NewBottle,
        max_unconfirmed: i64,
    ) -> Result<Option<Bottle>> {
        let id = Uuid::new_v4().to_string();

        let result = sqlx::query(
            "INSERT INTO bottles (id, email, text, status, created_at, send_at)
             SELECT $1, $2, $3, $4, $5, $6
             WHERE (
                 SELECT COUNT(*) FROM (
                     SELECT 1 FROM bottles WHERE email = $2 AND status = $4 LIMIT $7
                 )
             ) < $7",
        )
        .bind(&id)
        .bind(&new_bottle.email)
        .bind(&new_bottle.text)
        .bind(BottleStatus::Unconfirmed.as_str())
        .bind(to_db(&new_bottle.created_at))
        .bind(to_db(&new_bottle.send_at))
        .bind(max_unconfirmed)
        .execute(self.pool)
        .await
        .map_err(|e| BottleError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(&id).await
    }

    /// Get a bottle by id.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Bottle>> {
        let row = sqlx::query_as::<_, BottleRow>(&format!(
            "SELECT {COLUMNS} FROM bottles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| BottleError::Database(e.to_string()))?;

        row.map(Bottle::try_from).transpose()
    }

    /// Count `unconfirmed` bottles for an address, stopping at `limit`.
    ///
    /// Only the count is fetched, never the rows themselves.
    pub async fn count_unconfirmed(&self, email: &str, limit: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (
                 SELECT 1 FROM bottles WHERE email = $1 AND status = $2 LIMIT $3
             )",
        )
        .bind(email)
        .bind(BottleStatus::Unconfirmed.as_str())
        .bind(limit)
        .fetch_one(self.pool)
        .await
        .map_err(|e| BottleError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Move an `unconfirmed` bottle to `pending`.
    ///
    /// Returns `None` when no `unconfirmed` bottle has this id, which covers
    /// both unknown ids and bottles that were already confirmed.
    pub async fn confirm(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Bottle>> {
        let row = sqlx::query_as::<_, BottleRow>(&format!(
            "UPDATE bottles SET status = $1, confirmed_at = $2
             WHERE id = $3 AND status = $4
             RETURNING {COLUMNS}"
        ))
        .bind(BottleStatus::Pending.as_str())
        .bind(to_db(&now))
        .bind(id)
        .bind(BottleStatus::Unconfirmed.as_str())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| BottleError::Database(e.to_string()))?;

        row.map(Bottle::try_from).transpose()
    }

    /// Claim up to `limit` due bottles for dispatch.
    ///
    /// Due means `pending` with `send_at <= now`. Claimed bottles move to
    /// `sending` with `claimed_at = now` and one more attempt. Only the rows
    /// this call actually moved are returned.
    pub async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Bottle>> {
        let rows = sqlx::query_as::<_, BottleRow>(&format!(
            "UPDATE bottles SET status = $1, claimed_at = $2, attempts = attempts + 1
             WHERE status = $3 AND id IN (
                 SELECT id FROM bottles
                 WHERE status = $3 AND send_at <= $2
                 ORDER BY send_at ASC
                 LIMIT $4
             )
             RETURNING {COLUMNS}"
        ))
        .bind(BottleStatus::Sending.as_str())
        .bind(to_db(&now))
        .bind(BottleStatus::Pending.as_str())
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await
        .map_err(|e| BottleError::Database(e.to_string()))?;

        into_bottles(rows)
    }

    /// Re-claim `sending` bottles abandoned before `stale_before`.
    ///
    /// Bottles that already used `max_attempts` claims are left alone.
    pub async fn claim_stale(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        max_attempts: i64,
        limit: u32,
    ) -> Result<Vec<Bottle>> {
        let rows = sqlx::query_as::<_, BottleRow>(&format!(
            "UPDATE bottles SET claimed_at = $1, attempts = attempts + 1
             WHERE status = $2 AND claimed_at <= $3 AND attempts < $4 AND id IN (
                 SELECT id FROM bottles
                 WHERE status = $2 AND claimed_at <= $3 AND attempts < $4
                 ORDER BY claimed_at ASC
                 LIMIT $5
             )
             RETURNING {COLUMNS}"
        ))
        .bind(to_db(&now))
        .bind(BottleStatus::Sending.as_str())
        .bind(to_db(&stale_before))
        .bind(max_attempts)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await
        .map_err(|e| BottleError::Database(e.to_string()))?;

        into_bottles(rows)
    }

    /// Mark a `sending` bottle as delivered.
    ///
    /// Returns false if the bottle was not in `sending`.
    pub async fn mark_complete(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bottles SET status = $1, sent_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(BottleStatus::Complete.as_str())
        .bind(to_db(&now))
        .bind(id)
        .bind(BottleStatus::Sending.as_str())
        .execute(self.pool)
        .await
        .map_err(|e| BottleError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a failed dispatch. The bottle stays in `sending`.
    pub async fn record_failure(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query("UPDATE bottles SET last_error = $1 WHERE id = $2")
            .bind(error)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| BottleError::Database(e.to_string()))?;
        Ok(())
    }

    /// Count bottles in a given status.
    pub async fn count_by_status(&self, status: BottleStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bottles WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(self.pool)
            .await
            .map_err(|e| BottleError::Database(e.to_string()))?;
        Ok(count)
    }
}
