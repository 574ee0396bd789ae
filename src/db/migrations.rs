use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: SOS alerts and live positions

CREATE TABLE sos_alerts (
    id TEXT PRIMARY KEY,
    reporter_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    position_updated_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    resolved_at TEXT
);

-- Enforces at most one ACTIVE alert per reporter at the storage boundary.
-- A second concurrent trigger hits this index and re-reads the winner's row.
CREATE UNIQUE INDEX idx_sos_alerts_one_active
    ON sos_alerts(reporter_id) WHERE status = 'active';

CREATE TABLE sos_positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_id TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    recorded_at TEXT NOT NULL,
    FOREIGN KEY (alert_id) REFERENCES sos_alerts(id)
);

CREATE INDEX idx_sos_positions_alert ON sos_positions(alert_id);
",
        ),
        M::up(
            "-- Migration 2: Notifications

CREATE TABLE notifications (
    id TEXT PRIMARY KEY,
    recipient_id TEXT NOT NULL,
    category TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    payload TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_notifications_recipient
    ON notifications(recipient_id, created_at);
",
        ),
        M::up(
            "-- Migration 3: Trusted contacts and push subscriptions

CREATE TABLE trusted_contacts (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    phone TEXT NOT NULL,
    linked_user_id TEXT,
    verified INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_trusted_contacts_owner ON trusted_contacts(owner_id);

CREATE TABLE push_subscriptions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    p256dh TEXT NOT NULL,
    auth TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, endpoint)
);

CREATE INDEX idx_push_subscriptions_user ON push_subscriptions(user_id);
",
        ),
    ])
}
