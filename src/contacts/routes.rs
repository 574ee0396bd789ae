use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::contacts::store::{self, AddContactError};
use crate::contacts::is_valid_phone;
use crate::db::models::TrustedContact;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddContactRequest {
    pub display_name: String,
    pub phone: String,
    pub linked_user_id: Option<String>,
}

/// GET /api/contacts — List the caller's trusted contacts.
pub async fn list_contacts(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<TrustedContact>>, StatusCode> {
    let db = state.db.clone();
    let owner = claims.sub.clone();

    let contacts = tokio::task::spawn_blocking(move || store::list_for(&db, &owner))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list trusted contacts");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(contacts))
}

/// POST /api/contacts — Add a trusted contact.
/// 422 for a malformed phone number, 409 once the caller holds 5 contacts.
pub async fn add_contact(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<AddContactRequest>,
) -> Result<(StatusCode, Json<TrustedContact>), StatusCode> {
    if body.display_name.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    if !is_valid_phone(&body.phone) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let db = state.db.clone();
    let owner = claims.sub.clone();
    let contact = tokio::task::spawn_blocking(move || {
        store::add(
            &db,
            &owner,
            body.display_name.trim(),
            &body.phone,
            body.linked_user_id.as_deref(),
        )
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .map_err(|e| match e {
        AddContactError::LimitReached => StatusCode::CONFLICT,
        AddContactError::Db(e) => {
            tracing::error!(error = %e, "Failed to add trusted contact");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    Ok((StatusCode::CREATED, Json(contact)))
}

/// DELETE /api/contacts/{id} — Remove one of the caller's contacts,
/// freeing a slot. Another owner's contact id is a plain 404.
pub async fn delete_contact(
    State(state): State<AppState>,
    claims: Claims,
    Path(contact_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let db = state.db.clone();
    let owner = claims.sub.clone();

    let deleted = tokio::task::spawn_blocking(move || store::delete(&db, &owner, &contact_id))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to delete trusted contact");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
