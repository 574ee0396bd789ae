//! SOS session state machine over the durable store.
//!
//! Lifecycle per alert: (none) -> ACTIVE -> RESOLVED, RESOLVED terminal.
//! All functions here are synchronous rusqlite work; route handlers call
//! them through tokio::task::spawn_blocking. The shared connection is
//! mutex-serialized, and the partial unique index on (reporter_id) WHERE
//! status = 'active' backstops the one-active-alert-per-reporter
//! invariant against any concurrent trigger path.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::models::{SosAlert, SosPosition, SosStatus};
use crate::db::DbPool;
use crate::sos::SosError;

/// Result of a trigger call. `created` is false when the reporter already
/// had an ACTIVE alert and got it back unchanged.
#[derive(Debug)]
pub struct TriggerOutcome {
    pub alert: SosAlert,
    pub created: bool,
}

/// Result of a resolve call. `newly_resolved` is false for the
/// resolve-twice no-op.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub alert: SosAlert,
    pub newly_resolved: bool,
}

/// Trigger an SOS session. Idempotent per reporter: if an ACTIVE alert
/// exists it is returned unchanged, with no position mutation. A fresh
/// alert seeds its history with the initial point.
pub fn trigger(
    db: &DbPool,
    reporter_id: &str,
    latitude: f64,
    longitude: f64,
) -> Result<TriggerOutcome, SosError> {
    let mut conn = db.lock().map_err(|e| SosError::Db(e.to_string()))?;
    let tx = conn.transaction()?;

    if let Some(existing) = active_alert_row(&tx, reporter_id)? {
        tx.commit()?;
        return Ok(TriggerOutcome {
            alert: existing,
            created: false,
        });
    }

    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();

    let inserted = tx.execute(
        "INSERT INTO sos_alerts (id, reporter_id, status, latitude, longitude, position_updated_at, created_at)
         VALUES (?1, ?2, 'active', ?3, ?4, ?5, ?5)",
        params![id, reporter_id, latitude, longitude, now],
    );

    match inserted {
        Ok(_) => {}
        // Lost a same-reporter race against the unique active index:
        // observe the winner's alert instead of creating a duplicate.
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let existing = active_alert_row(&tx, reporter_id)?.ok_or(SosError::NotFound)?;
            tx.commit()?;
            return Ok(TriggerOutcome {
                alert: existing,
                created: false,
            });
        }
        Err(e) => return Err(e.into()),
    }

    tx.execute(
        "INSERT INTO sos_positions (alert_id, latitude, longitude, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, latitude, longitude, now],
    )?;
    tx.commit()?;

    Ok(TriggerOutcome {
        alert: SosAlert {
            id,
            reporter_id: reporter_id.to_string(),
            status: SosStatus::Active,
            latitude,
            longitude,
            position_updated_at: now.clone(),
            created_at: now,
            resolved_at: None,
        },
        created: true,
    })
}

/// Append a position to an ACTIVE alert. Reporter-only: any other caller
/// is NotAuthorized; a RESOLVED alert is InvalidState; no mutation occurs
/// on rejection.
pub fn position_update(
    db: &DbPool,
    alert_id: &str,
    caller_id: &str,
    latitude: f64,
    longitude: f64,
) -> Result<SosPosition, SosError> {
    let mut conn = db.lock().map_err(|e| SosError::Db(e.to_string()))?;
    let tx = conn.transaction()?;

    let alert = alert_row(&tx, alert_id)?.ok_or(SosError::NotFound)?;
    if alert.reporter_id != caller_id {
        return Err(SosError::NotAuthorized);
    }
    if alert.status == SosStatus::Resolved {
        return Err(SosError::InvalidState);
    }

    let now = Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE sos_alerts SET latitude = ?1, longitude = ?2, position_updated_at = ?3 WHERE id = ?4",
        params![latitude, longitude, now, alert_id],
    )?;
    tx.execute(
        "INSERT INTO sos_positions (alert_id, latitude, longitude, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![alert_id, latitude, longitude, now],
    )?;
    tx.commit()?;

    Ok(SosPosition {
        latitude,
        longitude,
        recorded_at: now,
    })
}

/// Resolve an alert. Reporter-only unless the caller carries the operator
/// claim. Resolving an already-RESOLVED alert is a no-op, not an error.
pub fn resolve(
    db: &DbPool,
    alert_id: &str,
    caller_id: &str,
    is_operator: bool,
) -> Result<ResolveOutcome, SosError> {
    let mut conn = db.lock().map_err(|e| SosError::Db(e.to_string()))?;
    let tx = conn.transaction()?;

    let mut alert = alert_row(&tx, alert_id)?.ok_or(SosError::NotFound)?;
    if alert.reporter_id != caller_id && !is_operator {
        return Err(SosError::NotAuthorized);
    }
    if alert.status == SosStatus::Resolved {
        return Ok(ResolveOutcome {
            alert,
            newly_resolved: false,
        });
    }

    let now = Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE sos_alerts SET status = 'resolved', resolved_at = ?1 WHERE id = ?2",
        params![now, alert_id],
    )?;
    tx.commit()?;

    alert.status = SosStatus::Resolved;
    alert.resolved_at = Some(now);

    Ok(ResolveOutcome {
        alert,
        newly_resolved: true,
    })
}

/// Alert by id with its full position history, oldest first.
pub fn alert_with_history(
    db: &DbPool,
    alert_id: &str,
) -> Result<Option<(SosAlert, Vec<SosPosition>)>, SosError> {
    let conn = db.lock().map_err(|e| SosError::Db(e.to_string()))?;

    let alert = match alert_row(&conn, alert_id)? {
        Some(alert) => alert,
        None => return Ok(None),
    };

    let mut stmt = conn.prepare(
        "SELECT latitude, longitude, recorded_at FROM sos_positions
         WHERE alert_id = ?1 ORDER BY id ASC",
    )?;
    let history: Vec<SosPosition> = stmt
        .query_map(params![alert_id], |row| {
            Ok(SosPosition {
                latitude: row.get(0)?,
                longitude: row.get(1)?,
                recorded_at: row.get(2)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(Some((alert, history)))
}

/// Current ACTIVE alert for an identity, if any.
pub fn active_alert_for(db: &DbPool, reporter_id: &str) -> Result<Option<SosAlert>, SosError> {
    let conn = db.lock().map_err(|e| SosError::Db(e.to_string()))?;
    Ok(active_alert_row(&conn, reporter_id)?)
}

fn alert_row(conn: &Connection, alert_id: &str) -> Result<Option<SosAlert>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, reporter_id, status, latitude, longitude, position_updated_at, created_at, resolved_at
         FROM sos_alerts WHERE id = ?1",
        params![alert_id],
        map_alert,
    )
    .optional()
}

fn active_alert_row(
    conn: &Connection,
    reporter_id: &str,
) -> Result<Option<SosAlert>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, reporter_id, status, latitude, longitude, position_updated_at, created_at, resolved_at
         FROM sos_alerts WHERE reporter_id = ?1 AND status = 'active'",
        params![reporter_id],
        map_alert,
    )
    .optional()
}

fn map_alert(row: &rusqlite::Row<'_>) -> Result<SosAlert, rusqlite::Error> {
    let status: String = row.get(2)?;
    // A status outside the lifecycle is corrupt data, not a state.
    let status = SosStatus::from_str(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown alert status {:?}", status).into(),
        )
    })?;
    Ok(SosAlert {
        id: row.get(0)?,
        reporter_id: row.get(1)?,
        status,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        position_updated_at: row.get(5)?,
        created_at: row.get(6)?,
        resolved_at: row.get(7)?,
    })
}
