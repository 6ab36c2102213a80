//! Database schema and migrations for bottlemail.
//!
//! Migrations are applied in order when the database is opened. The
//! `schema_version` table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: bottles table
    r#"
CREATE TABLE bottles (
    id            TEXT PRIMARY KEY,                      -- UUID v4, doubles as confirmation token
    email         TEXT NOT NULL,
    text          TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'unconfirmed',   -- 'unconfirmed', 'pending', 'sending', 'complete'
    created_at    TEXT NOT NULL,
    confirmed_at  TEXT,
    send_at       TEXT NOT NULL,
    sent_at       TEXT
);

CREATE INDEX idx_bottles_email_status ON bottles(email, status);
CREATE INDEX idx_bottles_status_send_at ON bottles(status, send_at);
"#,
    // v2: two-phase delivery bookkeeping
    r#"
ALTER TABLE bottles ADD COLUMN claimed_at TEXT;
ALTER TABLE bottles ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0;
ALTER TABLE bottles ADD COLUMN last_error TEXT;

CREATE INDEX idx_bottles_status_claimed_at ON bottles(status, claimed_at);
"#,
];
