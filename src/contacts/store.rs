//! Trusted-contact persistence. Owner-scoped: every query filters on
//! owner_id, and the 5-contact cap is checked inside the insert
//! transaction so concurrent adds cannot overshoot it.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::contacts::MAX_TRUSTED_CONTACTS;
use crate::db::models::TrustedContact;
use crate::db::DbPool;

#[derive(Debug)]
pub enum AddContactError {
    LimitReached,
    Db(String),
}

impl std::fmt::Display for AddContactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LimitReached => write!(f, "trusted contact limit reached"),
            Self::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

pub fn list_for(db: &DbPool, owner_id: &str) -> Result<Vec<TrustedContact>, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT id, owner_id, display_name, phone, linked_user_id, verified, created_at
             FROM trusted_contacts WHERE owner_id = ?1 ORDER BY created_at ASC",
        )
        .map_err(|e| e.to_string())?;

    let contacts: Vec<TrustedContact> = stmt
        .query_map(params![owner_id], |row| {
            Ok(TrustedContact {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                display_name: row.get(2)?,
                phone: row.get(3)?,
                linked_user_id: row.get(4)?,
                verified: row.get::<_, i64>(5)? != 0,
                created_at: row.get(6)?,
            })
        })
        .map_err(|e| e.to_string())?
        .filter_map(|r| r.ok())
        .collect();

    Ok(contacts)
}

pub fn add(
    db: &DbPool,
    owner_id: &str,
    display_name: &str,
    phone: &str,
    linked_user_id: Option<&str>,
) -> Result<TrustedContact, AddContactError> {
    let mut conn = db.lock().map_err(|e| AddContactError::Db(e.to_string()))?;
    let tx = conn
        .transaction()
        .map_err(|e| AddContactError::Db(e.to_string()))?;

    let count: i64 = tx
        .query_row(
            "SELECT COUNT(*) FROM trusted_contacts WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )
        .map_err(|e| AddContactError::Db(e.to_string()))?;
    if count as usize >= MAX_TRUSTED_CONTACTS {
        return Err(AddContactError::LimitReached);
    }

    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO trusted_contacts (id, owner_id, display_name, phone, linked_user_id, verified, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![id, owner_id, display_name, phone, linked_user_id, now],
    )
    .map_err(|e| AddContactError::Db(e.to_string()))?;
    tx.commit().map_err(|e| AddContactError::Db(e.to_string()))?;

    Ok(TrustedContact {
        id,
        owner_id: owner_id.to_string(),
        display_name: display_name.to_string(),
        phone: phone.to_string(),
        linked_user_id: linked_user_id.map(|s| s.to_string()),
        verified: false,
        created_at: now,
    })
}

/// Delete one of the owner's contacts. Returns false when no row matched
/// (unknown id, or a contact belonging to someone else).
pub fn delete(db: &DbPool, owner_id: &str, contact_id: &str) -> Result<bool, String> {
    let conn = db.lock().map_err(|e| e.to_string())?;
    let affected = conn
        .execute(
            "DELETE FROM trusted_contacts WHERE id = ?1 AND owner_id = ?2",
            params![contact_id, owner_id],
        )
        .map_err(|e| e.to_string())?;
    Ok(affected > 0)
}
