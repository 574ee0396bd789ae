//! Push subscription persistence. All lookups are scoped by identity;
//! one identity's subscriptions are never visible when acting as another.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::db::models::PushSubscriptionRow;
use crate::db::DbPool;

/// Upsert by (identity, endpoint): re-registering an endpoint replaces
/// its key material (devices rotate keys on re-subscribe).
pub fn add(
    db: &DbPool,
    user_id: &str,
    endpoint: &str,
    p256dh: &str,
    auth: &str,
) -> Result<PushSubscriptionRow, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh, auth, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (user_id, endpoint)
         DO UPDATE SET p256dh = excluded.p256dh, auth = excluded.auth",
        params![id, user_id, endpoint, p256dh, auth, now],
    )
    .map_err(|e| e.to_string())?;

    // Re-read so the caller gets the surviving row (id differs when the
    // insert hit the conflict arm).
    conn.query_row(
        "SELECT id, user_id, endpoint, p256dh, auth, created_at
         FROM push_subscriptions WHERE user_id = ?1 AND endpoint = ?2",
        params![user_id, endpoint],
        map_subscription,
    )
    .map_err(|e| e.to_string())
}

/// Remove one endpoint's subscription. Used both on explicit unsubscribe
/// and when delivery reports the endpoint permanently gone.
pub fn remove_by_endpoint(db: &DbPool, user_id: &str, endpoint: &str) -> Result<bool, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    let affected = conn
        .execute(
            "DELETE FROM push_subscriptions WHERE user_id = ?1 AND endpoint = ?2",
            params![user_id, endpoint],
        )
        .map_err(|e| e.to_string())?;
    Ok(affected > 0)
}

pub fn list_for(db: &DbPool, user_id: &str) -> Result<Vec<PushSubscriptionRow>, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, endpoint, p256dh, auth, created_at
             FROM push_subscriptions WHERE user_id = ?1 ORDER BY created_at ASC",
        )
        .map_err(|e| e.to_string())?;

    let subscriptions: Vec<PushSubscriptionRow> = stmt
        .query_map(params![user_id], map_subscription)
        .map_err(|e| e.to_string())?
        .filter_map(|r| r.ok())
        .collect();

    Ok(subscriptions)
}

fn map_subscription(row: &rusqlite::Row<'_>) -> Result<PushSubscriptionRow, rusqlite::Error> {
    Ok(PushSubscriptionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        endpoint: row.get(2)?,
        p256dh: row.get(3)?,
        auth: row.get(4)?,
        created_at: row.get(5)?,
    })
}
