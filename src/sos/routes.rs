//! REST surface for the SOS lifecycle. Handlers run the state machine on
//! the blocking pool, then perform live-channel side effects (room
//! broadcasts, contact notification fan-out) best-effort.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::contacts;
use crate::db::models::{SosAlert, SosPosition};
use crate::notify::category::NotificationKind;
use crate::notify::dispatcher;
use crate::sos::{manager, SosError};
use crate::state::AppState;
use crate::ws::protocol::ServerEvent;
use crate::ws::sos_room;

#[derive(Debug, Deserialize)]
pub struct CoordinatesRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct AlertWithHistory {
    #[serde(flatten)]
    pub alert: SosAlert,
    pub history: Vec<SosPosition>,
}

/// POST /api/sos — Trigger an SOS session.
/// Idempotent: a reporter with an ACTIVE alert gets it back unchanged and
/// is not told it was a duplicate. On fresh creation, every trusted
/// contact with a linked platform identity is notified.
pub async fn trigger_sos(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<CoordinatesRequest>,
) -> Result<(StatusCode, Json<SosAlert>), SosError> {
    let db = state.db.clone();
    let reporter_id = claims.sub.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        manager::trigger(&db, &reporter_id, body.latitude, body.longitude)
    })
    .await
    .map_err(|e| SosError::Db(e.to_string()))??;

    if outcome.created {
        notify_trusted_contacts(&state, &outcome.alert).await;
    }

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.alert)))
}

/// POST /api/sos/{id}/location — Append a position update.
/// Reporter-only; broadcasts the new position to the alert's watchers.
pub async fn update_location(
    State(state): State<AppState>,
    claims: Claims,
    Path(alert_id): Path<String>,
    Json(body): Json<CoordinatesRequest>,
) -> Result<Json<SosPosition>, SosError> {
    let db = state.db.clone();
    let caller = claims.sub.clone();
    let id = alert_id.clone();
    let position = tokio::task::spawn_blocking(move || {
        manager::position_update(&db, &id, &caller, body.latitude, body.longitude)
    })
    .await
    .map_err(|e| SosError::Db(e.to_string()))??;

    // Broadcasts follow handler completion, not commit order: updates
    // issued sequentially on one reporter connection reach watchers in
    // order, but concurrent requests from separate connections carry no
    // cross-request ordering guarantee.
    state.rooms.broadcast(
        &state.connections,
        &sos_room(&alert_id),
        &ServerEvent::SosLocationChanged {
            latitude: position.latitude,
            longitude: position.longitude,
        },
    );

    Ok(Json(position))
}

/// POST /api/sos/{id}/resolve — Terminate an alert.
/// Reporter (or operator) only; broadcasts a resolution event to the
/// alert's watchers. Resolving twice is a no-op.
pub async fn resolve_sos(
    State(state): State<AppState>,
    claims: Claims,
    Path(alert_id): Path<String>,
) -> Result<Json<SosAlert>, SosError> {
    let db = state.db.clone();
    let caller = claims.sub.clone();
    let is_operator = claims.is_operator;
    let id = alert_id.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        manager::resolve(&db, &id, &caller, is_operator)
    })
    .await
    .map_err(|e| SosError::Db(e.to_string()))??;

    if outcome.newly_resolved {
        state.rooms.broadcast(
            &state.connections,
            &sos_room(&alert_id),
            &ServerEvent::SosResolved {
                alert_id: alert_id.clone(),
            },
        );
    }

    Ok(Json(outcome.alert))
}

/// GET /api/sos/{id} — Alert state with full position history.
pub async fn get_alert(
    State(state): State<AppState>,
    _claims: Claims,
    Path(alert_id): Path<String>,
) -> Result<Json<AlertWithHistory>, SosError> {
    let db = state.db.clone();
    let id = alert_id.clone();
    let found = tokio::task::spawn_blocking(move || manager::alert_with_history(&db, &id))
        .await
        .map_err(|e| SosError::Db(e.to_string()))??;

    let (alert, history) = found.ok_or(SosError::NotFound)?;
    Ok(Json(AlertWithHistory { alert, history }))
}

/// GET /api/sos/active — The caller's own ACTIVE alert, 404 when none.
pub async fn get_active_alert(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<SosAlert>, SosError> {
    let db = state.db.clone();
    let reporter = claims.sub.clone();
    let alert = tokio::task::spawn_blocking(move || manager::active_alert_for(&db, &reporter))
        .await
        .map_err(|e| SosError::Db(e.to_string()))??;

    alert.map(Json).ok_or(SosError::NotFound)
}

/// Fan one SOS-triggered notification out to each trusted contact with a
/// linked platform identity. Dispatch failures are logged, never
/// propagated: the alert itself already exists.
async fn notify_trusted_contacts(state: &AppState, alert: &SosAlert) {
    let db = state.db.clone();
    let owner = alert.reporter_id.clone();
    let listed =
        tokio::task::spawn_blocking(move || contacts::store::list_for(&db, &owner)).await;

    let contact_list = match listed {
        Ok(Ok(list)) => list,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to load trusted contacts for SOS fan-out");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "Trusted contact query panicked");
            return;
        }
    };

    for contact in contact_list {
        let Some(recipient) = contact.linked_user_id else {
            // Phone-only contact; out-of-band channels (SMS) are not
            // part of this core.
            continue;
        };
        let kind = NotificationKind::Sos {
            alert_id: alert.id.clone(),
            reporter_id: alert.reporter_id.clone(),
        };
        let body = format!(
            "{} triggered an emergency alert and shared their live location with you",
            alert.reporter_id
        );
        if let Err(e) =
            dispatcher::dispatch(state, &recipient, kind, "SOS alert", &body).await
        {
            tracing::error!(
                recipient = %recipient,
                error = %e,
                "SOS notification dispatch failed"
            );
        }
    }
}
