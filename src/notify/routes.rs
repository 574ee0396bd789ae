//! Notification center REST surface: the recipient's view over the
//! durable records. All operations are scoped to the caller; another
//! identity's notification id behaves like an unknown id.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::notify::category::NotificationRecord;
use crate::notify::store;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

/// GET /api/notifications — The caller's notifications, newest first.
/// Archived records are excluded unless ?include_archived=true.
pub async fn list_notifications(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<NotificationRecord>>, StatusCode> {
    let db = state.db.clone();
    let recipient = claims.sub.clone();
    let records = tokio::task::spawn_blocking(move || {
        store::list_for(&db, &recipient, query.include_archived)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to list notifications");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(records))
}

/// GET /api/notifications/unread-count
pub async fn get_unread_count(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<UnreadCountResponse>, StatusCode> {
    let db = state.db.clone();
    let recipient = claims.sub.clone();
    let unread = tokio::task::spawn_blocking(move || store::unread_count(&db, &recipient))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to count unread notifications");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(UnreadCountResponse { unread }))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    recipient_scoped_update(state, claims.sub, id, store::mark_read).await
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();
    let recipient = claims.sub.clone();
    tokio::task::spawn_blocking(move || store::mark_all_read(&db, &recipient))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to mark notifications read");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/notifications/{id}/archive
pub async fn archive_notification(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    recipient_scoped_update(state, claims.sub, id, store::archive).await
}

/// DELETE /api/notifications/{id}
pub async fn delete_notification(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    recipient_scoped_update(state, claims.sub, id, store::delete).await
}

/// Shared shape of the single-record mutations: run the store op on the
/// blocking pool, 204 when a row matched, 404 otherwise.
async fn recipient_scoped_update(
    state: AppState,
    recipient: String,
    id: String,
    op: fn(&crate::db::DbPool, &str, &str) -> Result<bool, String>,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();
    let matched = tokio::task::spawn_blocking(move || op(&db, &recipient, &id))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!(error = %e, "Notification update failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if matched {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
