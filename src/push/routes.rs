use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::push::registry;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub endpoint: String,
    pub created_at: String,
}

/// POST /api/push/subscriptions — Register (or re-register) a device
/// endpoint for the caller. Upserts by endpoint.
pub async fn subscribe(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), StatusCode> {
    if body.endpoint.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let db = state.db.clone();
    let user = claims.sub.clone();
    let row = tokio::task::spawn_blocking(move || {
        registry::add(&db, &user, &body.endpoint, &body.keys.p256dh, &body.keys.auth)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to store push subscription");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse {
            id: row.id,
            endpoint: row.endpoint,
            created_at: row.created_at,
        }),
    ))
}

/// DELETE /api/push/subscriptions — Explicit unsubscribe for one of the
/// caller's endpoints. Unknown endpoint is a no-op 204.
pub async fn unsubscribe(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<UnsubscribeRequest>,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();
    let user = claims.sub.clone();
    tokio::task::spawn_blocking(move || registry::remove_by_endpoint(&db, &user, &body.endpoint))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to remove push subscription");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/push/subscriptions — The caller's registered endpoints.
pub async fn list_subscriptions(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<SubscriptionResponse>>, StatusCode> {
    let db = state.db.clone();
    let user = claims.sub.clone();
    let rows = tokio::task::spawn_blocking(move || registry::list_for(&db, &user))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list push subscriptions");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(
        rows.into_iter()
            .map(|row| SubscriptionResponse {
                id: row.id,
                endpoint: row.endpoint,
                created_at: row.created_at,
            })
            .collect(),
    ))
}
