//! Durable notification persistence. The record is the source of truth;
//! live and push delivery are optimizations layered on top of it.
//! Mutations (read/archive/delete) are recipient-scoped: a foreign id
//! simply matches no row.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::db::models::NotificationRow;
use crate::db::DbPool;
use crate::notify::category::{NotificationKind, NotificationRecord};

pub fn insert(
    db: &DbPool,
    recipient_id: &str,
    kind: &NotificationKind,
    title: &str,
    body: &str,
) -> Result<NotificationRecord, String> {
    let payload = serde_json::to_string(kind).map_err(|e| e.to_string())?;
    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();

    let conn = db.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO notifications (id, recipient_id, category, title, body, payload, is_read, archived, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7)",
        params![id, recipient_id, kind.category(), title, body, payload, now],
    )
    .map_err(|e| e.to_string())?;

    Ok(NotificationRecord {
        id,
        recipient_id: recipient_id.to_string(),
        link: kind.link(),
        kind: kind.clone(),
        title: title.to_string(),
        body: body.to_string(),
        is_read: false,
        archived: false,
        created_at: now,
    })
}

pub fn list_for(
    db: &DbPool,
    recipient_id: &str,
    include_archived: bool,
) -> Result<Vec<NotificationRecord>, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    let sql = if include_archived {
        "SELECT id, recipient_id, category, title, body, payload, is_read, archived, created_at
         FROM notifications WHERE recipient_id = ?1 ORDER BY created_at DESC"
    } else {
        "SELECT id, recipient_id, category, title, body, payload, is_read, archived, created_at
         FROM notifications WHERE recipient_id = ?1 AND archived = 0 ORDER BY created_at DESC"
    };
    let mut stmt = conn.prepare(sql).map_err(|e| e.to_string())?;

    let rows: Vec<NotificationRow> = stmt
        .query_map(params![recipient_id], |row| {
            Ok(NotificationRow {
                id: row.get(0)?,
                recipient_id: row.get(1)?,
                category: row.get(2)?,
                title: row.get(3)?,
                body: row.get(4)?,
                payload: row.get(5)?,
                is_read: row.get::<_, i64>(6)? != 0,
                archived: row.get::<_, i64>(7)? != 0,
                created_at: row.get(8)?,
            })
        })
        .map_err(|e| e.to_string())?
        .filter_map(|r| r.ok())
        .collect();

    Ok(rows.into_iter().filter_map(record_from_row).collect())
}

pub fn unread_count(db: &DbPool, recipient_id: &str) -> Result<i64, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0 AND archived = 0",
        params![recipient_id],
        |row| row.get(0),
    )
    .map_err(|e| e.to_string())
}

pub fn mark_read(db: &DbPool, recipient_id: &str, id: &str) -> Result<bool, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    let affected = conn
        .execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2",
            params![id, recipient_id],
        )
        .map_err(|e| e.to_string())?;
    Ok(affected > 0)
}

pub fn mark_all_read(db: &DbPool, recipient_id: &str) -> Result<usize, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
        params![recipient_id],
    )
    .map_err(|e| e.to_string())
}

pub fn archive(db: &DbPool, recipient_id: &str, id: &str) -> Result<bool, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    let affected = conn
        .execute(
            "UPDATE notifications SET archived = 1 WHERE id = ?1 AND recipient_id = ?2",
            params![id, recipient_id],
        )
        .map_err(|e| e.to_string())?;
    Ok(affected > 0)
}

pub fn delete(db: &DbPool, recipient_id: &str, id: &str) -> Result<bool, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    let affected = conn
        .execute(
            "DELETE FROM notifications WHERE id = ?1 AND recipient_id = ?2",
            params![id, recipient_id],
        )
        .map_err(|e| e.to_string())?;
    Ok(affected > 0)
}

/// Rehydrate a stored row into the wire record. A payload that no longer
/// parses (schema drift) is dropped from listings rather than failing the
/// whole query.
fn record_from_row(row: NotificationRow) -> Option<NotificationRecord> {
    let kind: NotificationKind = match serde_json::from_str(&row.payload) {
        Ok(kind) => kind,
        Err(e) => {
            tracing::warn!(
                notification_id = %row.id,
                error = %e,
                "Unparseable notification payload"
            );
            return None;
        }
    };
    Some(NotificationRecord {
        link: kind.link(),
        kind,
        id: row.id,
        recipient_id: row.recipient_id,
        title: row.title,
        body: row.body,
        is_read: row.is_read,
        archived: row.archived,
        created_at: row.created_at,
    })
}
