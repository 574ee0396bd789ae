use axum::{middleware, Router};

use crate::auth::middleware::JwtSecret;
use crate::contacts::routes as contact_handlers;
use crate::notify::routes as notify_handlers;
use crate::push::routes as push_handlers;
use crate::sos::routes as sos_handlers;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Simple health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let sos_routes = Router::new()
        .route("/api/sos", axum::routing::post(sos_handlers::trigger_sos))
        .route(
            "/api/sos/active",
            axum::routing::get(sos_handlers::get_active_alert),
        )
        .route("/api/sos/{id}", axum::routing::get(sos_handlers::get_alert))
        .route(
            "/api/sos/{id}/location",
            axum::routing::post(sos_handlers::update_location),
        )
        .route(
            "/api/sos/{id}/resolve",
            axum::routing::post(sos_handlers::resolve_sos),
        );

    let notification_routes = Router::new()
        .route(
            "/api/notifications",
            axum::routing::get(notify_handlers::list_notifications),
        )
        .route(
            "/api/notifications/unread-count",
            axum::routing::get(notify_handlers::get_unread_count),
        )
        .route(
            "/api/notifications/read-all",
            axum::routing::post(notify_handlers::mark_all_read),
        )
        .route(
            "/api/notifications/{id}/read",
            axum::routing::post(notify_handlers::mark_read),
        )
        .route(
            "/api/notifications/{id}/archive",
            axum::routing::post(notify_handlers::archive_notification),
        )
        .route(
            "/api/notifications/{id}",
            axum::routing::delete(notify_handlers::delete_notification),
        );

    let contact_routes = Router::new()
        .route(
            "/api/contacts",
            axum::routing::get(contact_handlers::list_contacts),
        )
        .route(
            "/api/contacts",
            axum::routing::post(contact_handlers::add_contact),
        )
        .route(
            "/api/contacts/{id}",
            axum::routing::delete(contact_handlers::delete_contact),
        );

    let push_subscription_routes = Router::new()
        .route(
            "/api/push/subscriptions",
            axum::routing::get(push_handlers::list_subscriptions),
        )
        .route(
            "/api/push/subscriptions",
            axum::routing::post(push_handlers::subscribe),
        )
        .route(
            "/api/push/subscriptions",
            axum::routing::delete(push_handlers::unsubscribe),
        );

    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(sos_routes)
        .merge(notification_routes)
        .merge(contact_routes)
        .merge(push_subscription_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}
