//! Notification dispatcher: one durable record, then every reachable
//! channel.
//!
//! Durability precedes delivery: the record insert is the only step that
//! can fail the call. The live-socket broadcast and the per-subscription
//! push sends are independent best-effort side channels; neither can
//! affect the other or the caller.

use thiserror::Error;
use tokio::time::timeout;

use crate::notify::category::{NotificationKind, NotificationRecord};
use crate::notify::store;
use crate::push::registry as push_registry;
use crate::push::transport::{seal_payload, PushOutcome};
use crate::state::AppState;
use crate::ws::protocol::ServerEvent;
use crate::ws::user_room;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to persist notification: {0}")]
    Db(String),
}

/// Persist and deliver one notification.
/// Returns the durable record; push and socket failures never surface here.
pub async fn dispatch(
    state: &AppState,
    recipient_id: &str,
    kind: NotificationKind,
    title: &str,
    body: &str,
) -> Result<NotificationRecord, DispatchError> {
    // Step 1: durable record, unconditional.
    let db = state.db.clone();
    let recipient = recipient_id.to_string();
    let kind_for_insert = kind.clone();
    let title_owned = title.to_string();
    let body_owned = body.to_string();
    let record = tokio::task::spawn_blocking(move || {
        store::insert(&db, &recipient, &kind_for_insert, &title_owned, &body_owned)
    })
    .await
    .map_err(|e| DispatchError::Db(e.to_string()))?
    .map_err(DispatchError::Db)?;

    // Step 2: live socket push to every connection in the user room.
    state.rooms.broadcast(
        &state.connections,
        &user_room(recipient_id),
        &ServerEvent::Notification(record.clone()),
    );

    // Step 3: browser/OS push, one independent task per subscription.
    fan_out_push(state, &record);

    Ok(record)
}

/// Spawn the push fan-out for a freshly persisted record. Runs detached:
/// dispatch does not wait for push-transport round trips.
fn fan_out_push(state: &AppState, record: &NotificationRecord) {
    if !state.push_enabled {
        return;
    }

    let state = state.clone();
    let record = record.clone();
    tokio::spawn(async move {
        let db = state.db.clone();
        let recipient = record.recipient_id.clone();
        let subscriptions =
            match tokio::task::spawn_blocking(move || push_registry::list_for(&db, &recipient))
                .await
            {
                Ok(Ok(subs)) => subs,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Failed to load push subscriptions");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Push subscription query panicked");
                    return;
                }
            };

        let plaintext = match serde_json::to_vec(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize push payload");
                return;
            }
        };

        for subscription in subscriptions {
            let state = state.clone();
            let plaintext = plaintext.clone();
            tokio::spawn(async move {
                let sealed = match seal_payload(
                    &subscription.p256dh,
                    &subscription.auth,
                    &plaintext,
                ) {
                    Ok(sealed) => sealed,
                    Err(e) => {
                        tracing::warn!(
                            endpoint = %subscription.endpoint,
                            error = %e,
                            "Could not seal push payload, subscription kept"
                        );
                        return;
                    }
                };

                // The transport bounds its own network time; this outer
                // timeout caps misbehaving implementations as well.
                let outcome = match timeout(
                    state.push_timeout,
                    state.push.send(&subscription, &sealed),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => PushOutcome::Transient,
                };

                match outcome {
                    PushOutcome::Delivered => {}
                    PushOutcome::Transient => {
                        tracing::warn!(
                            endpoint = %subscription.endpoint,
                            "Transient push failure, subscription kept"
                        );
                    }
                    PushOutcome::Permanent => {
                        tracing::info!(
                            endpoint = %subscription.endpoint,
                            "Push endpoint gone, removing subscription"
                        );
                        let db = state.db.clone();
                        let user = subscription.user_id.clone();
                        let endpoint = subscription.endpoint.clone();
                        let removed = tokio::task::spawn_blocking(move || {
                            push_registry::remove_by_endpoint(&db, &user, &endpoint)
                        })
                        .await;
                        if let Ok(Err(e)) = removed {
                            tracing::error!(error = %e, "Failed to remove dead subscription");
                        }
                    }
                }
            });
        }
    });
}
