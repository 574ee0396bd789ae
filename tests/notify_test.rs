//! Integration tests for the notification dispatcher and the
//! notification-center REST surface: durable-record guarantees, live
//! fan-out, and per-subscription push failure handling.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use lifeline_server::db::models::PushSubscriptionRow;
use lifeline_server::notify::category::NotificationKind;
use lifeline_server::notify::{dispatcher, store};
use lifeline_server::push::registry as push_registry;
use lifeline_server::push::transport::{PushOutcome, PushTransport};
use lifeline_server::state::AppState;

/// Transport with per-endpoint scripted outcomes; records every send.
#[derive(Default)]
struct ScriptedTransport {
    outcomes: Mutex<HashMap<String, PushOutcome>>,
    sends: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn script(&self, endpoint: &str, outcome: PushOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), outcome);
    }

    fn sends(&self) -> Vec<String> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PushTransport for ScriptedTransport {
    async fn send(&self, subscription: &PushSubscriptionRow, _sealed: &[u8]) -> PushOutcome {
        self.sends
            .lock()
            .unwrap()
            .push(subscription.endpoint.clone());
        self.outcomes
            .lock()
            .unwrap()
            .get(&subscription.endpoint)
            .copied()
            .unwrap_or(PushOutcome::Delivered)
    }
}

/// Build an AppState around a scripted transport, no HTTP listener.
fn build_state(push: Arc<ScriptedTransport>) -> (AppState, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = lifeline_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = lifeline_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = AppState {
        db,
        jwt_secret,
        connections: Arc::new(lifeline_server::ws::registry::ConnectionRegistry::new()),
        rooms: Arc::new(lifeline_server::ws::rooms::RoomManager::new()),
        push,
        push_enabled: true,
        push_timeout: Duration::from_secs(2),
    };
    (state, tmp_dir)
}

fn url_safe_key(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn add_subscription(state: &AppState, user: &str, endpoint: &str) {
    push_registry::add(
        &state.db,
        user,
        endpoint,
        &url_safe_key(b"content-key-material"),
        &url_safe_key(b"auth-secret"),
    )
    .expect("Failed to add subscription");
}

/// Wait for the detached push fan-out to reach the expected send count.
async fn wait_for_sends(transport: &ScriptedTransport, expected: usize) {
    for _ in 0..50 {
        if transport.sends().len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "Push fan-out never reached {} sends (got {})",
        expected,
        transport.sends().len()
    );
}

fn message_kind() -> NotificationKind {
    NotificationKind::Message {
        conversation_id: "c1".into(),
        sender_id: "u9".into(),
    }
}

#[tokio::test]
async fn dispatch_persists_exactly_one_record_with_no_channels() {
    let transport = Arc::new(ScriptedTransport::default());
    let (state, _tmp) = build_state(transport.clone());

    // Zero live connections, zero subscriptions.
    let record = dispatcher::dispatch(&state, "u2", message_kind(), "New message", "Hello")
        .await
        .expect("dispatch failed");
    assert!(!record.is_read);
    assert_eq!(record.link, "/messages/c1");

    let listed = store::list_for(&state.db, "u2", false).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);

    // No subscriptions, so no transport traffic.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(transport.sends().is_empty());
}

#[tokio::test]
async fn dispatch_attempts_push_for_offline_recipient() {
    let transport = Arc::new(ScriptedTransport::default());
    let (state, _tmp) = build_state(transport.clone());

    add_subscription(&state, "u2", "https://push.example/dev1");

    dispatcher::dispatch(&state, "u2", message_kind(), "New message", "Hello")
        .await
        .expect("dispatch failed");

    wait_for_sends(&transport, 1).await;
    assert_eq!(transport.sends(), vec!["https://push.example/dev1"]);

    // Exactly one durable record regardless of channel count.
    assert_eq!(store::list_for(&state.db, "u2", false).unwrap().len(), 1);
}

#[tokio::test]
async fn permanent_failure_removes_only_that_subscription() {
    let transport = Arc::new(ScriptedTransport::default());
    let (state, _tmp) = build_state(transport.clone());

    add_subscription(&state, "u2", "https://push.example/dead");
    add_subscription(&state, "u2", "https://push.example/alive");
    transport.script("https://push.example/dead", PushOutcome::Permanent);

    dispatcher::dispatch(&state, "u2", message_kind(), "New message", "Hello")
        .await
        .expect("dispatch failed");
    wait_for_sends(&transport, 2).await;

    // The dead endpoint is dropped; the live one survives.
    for _ in 0..50 {
        if push_registry::list_for(&state.db, "u2").unwrap().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let remaining = push_registry::list_for(&state.db, "u2").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].endpoint, "https://push.example/alive");
}

#[tokio::test]
async fn transient_failure_keeps_subscription() {
    let transport = Arc::new(ScriptedTransport::default());
    let (state, _tmp) = build_state(transport.clone());

    add_subscription(&state, "u2", "https://push.example/flaky");
    transport.script("https://push.example/flaky", PushOutcome::Transient);

    dispatcher::dispatch(&state, "u2", message_kind(), "New message", "Hello")
        .await
        .expect("dispatch failed");
    wait_for_sends(&transport, 1).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(push_registry::list_for(&state.db, "u2").unwrap().len(), 1);
}

#[tokio::test]
async fn subscriptions_are_identity_scoped() {
    let transport = Arc::new(ScriptedTransport::default());
    let (state, _tmp) = build_state(transport.clone());

    add_subscription(&state, "u2", "https://push.example/u2");
    add_subscription(&state, "u3", "https://push.example/u3");

    dispatcher::dispatch(&state, "u2", message_kind(), "New message", "Hello")
        .await
        .expect("dispatch failed");
    wait_for_sends(&transport, 1).await;

    // Only u2's endpoint was contacted.
    assert_eq!(transport.sends(), vec!["https://push.example/u2"]);
}

// --- Live-server tests: REST surface and end-to-end SOS fan-out ---

async fn start_test_server(
    transport: Arc<ScriptedTransport>,
) -> (String, String, Vec<u8>, AppState) {
    let (state, tmp_dir) = build_state(transport);
    let jwt_secret = state.jwt_secret.clone();

    let app = lifeline_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (
        format!("http://{}", addr),
        format!("ws://{}/ws", addr),
        jwt_secret,
        state,
    )
}

fn token_for(secret: &[u8], user_id: &str) -> String {
    lifeline_server::auth::jwt::issue_access_token(secret, user_id, false)
        .expect("Failed to issue token")
}

#[tokio::test]
async fn sos_trigger_notifies_linked_trusted_contacts() {
    let transport = Arc::new(ScriptedTransport::default());
    let (base_url, ws_url, secret, _state) = start_test_server(transport).await;
    let client = reqwest::Client::new();
    let reporter = token_for(&secret, "u1");
    let contact_user = token_for(&secret, "u2");

    // u1 trusts u2 (linked) and one phone-only contact.
    for body in [
        serde_json::json!({
            "display_name": "Ada",
            "phone": "+2348012345678",
            "linked_user_id": "u2"
        }),
        serde_json::json!({
            "display_name": "Ben",
            "phone": "+2348098765432"
        }),
    ] {
        let resp = client
            .post(format!("{}/api/contacts", base_url))
            .bearer_auth(&reporter)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    // u2 is online over WS.
    let (stream, _) =
        tokio_tungstenite::connect_async(format!("{}?token={}", ws_url, contact_user))
            .await
            .expect("WS connect failed");
    let (_write, mut read) = stream.split();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = client
        .post(format!("{}/api/sos", base_url))
        .bearer_auth(&reporter)
        .json(&serde_json::json!({ "latitude": 6.5, "longitude": 3.4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let alert: serde_json::Value = resp.json().await.unwrap();

    // u2 receives the live notification event with the full record.
    let event = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                    if value["event"] == "notification" {
                        break value;
                    }
                }
                Some(Ok(_)) => continue,
                other => panic!("WS stream ended early: {:?}", other),
            }
        }
    })
    .await
    .expect("Expected notification event");

    let data = &event["data"];
    assert_eq!(data["category"], "sos");
    assert_eq!(data["payload"]["alert_id"], alert["id"]);
    assert_eq!(data["payload"]["reporter_id"], "u1");
    assert_eq!(data["link"], format!("/sos/{}", alert["id"].as_str().unwrap()));

    // One durable record for u2; the phone-only contact produced none.
    let listed: serde_json::Value = client
        .get(format!("{}/api/notifications", base_url))
        .bearer_auth(&contact_user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn notification_center_flow() {
    let transport = Arc::new(ScriptedTransport::default());
    let (base_url, _ws_url, secret, state) = start_test_server(transport).await;
    let client = reqwest::Client::new();
    let recipient = token_for(&secret, "u2");
    let stranger = token_for(&secret, "u3");

    let first = dispatcher::dispatch(&state, "u2", message_kind(), "New message", "Hello")
        .await
        .unwrap();
    // Distinct timestamps so the newest-first ordering is unambiguous.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = dispatcher::dispatch(
        &state,
        "u2",
        NotificationKind::Booking {
            booking_id: "b1".into(),
            status: "confirmed".into(),
        },
        "Booking confirmed",
        "See you there",
    )
    .await
    .unwrap();

    let unread: serde_json::Value = client
        .get(format!("{}/api/notifications/unread-count", base_url))
        .bearer_auth(&recipient)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["unread"], 2);

    // Newest first.
    let listed: serde_json::Value = client
        .get(format!("{}/api/notifications", base_url))
        .bearer_auth(&recipient)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], second.id.as_str());

    // Another identity cannot touch u2's records.
    let resp = client
        .post(format!("{}/api/notifications/{}/read", base_url, first.id))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .post(format!("{}/api/notifications/{}/read", base_url, first.id))
        .bearer_auth(&recipient)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let unread: serde_json::Value = client
        .get(format!("{}/api/notifications/unread-count", base_url))
        .bearer_auth(&recipient)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["unread"], 1);

    // Archive hides from the default listing but not the archived view.
    let resp = client
        .post(format!(
            "{}/api/notifications/{}/archive",
            base_url, second.id
        ))
        .bearer_auth(&recipient)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let listed: serde_json::Value = client
        .get(format!("{}/api/notifications", base_url))
        .bearer_auth(&recipient)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let listed: serde_json::Value = client
        .get(format!(
            "{}/api/notifications?include_archived=true",
            base_url
        ))
        .bearer_auth(&recipient)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);

    // Delete is permanent.
    let resp = client
        .delete(format!("{}/api/notifications/{}", base_url, first.id))
        .bearer_auth(&recipient)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let resp = client
        .delete(format!("{}/api/notifications/{}", base_url, first.id))
        .bearer_auth(&recipient)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn push_subscription_rest_flow() {
    let transport = Arc::new(ScriptedTransport::default());
    let (base_url, _ws_url, secret, _state) = start_test_server(transport).await;
    let client = reqwest::Client::new();
    let user = token_for(&secret, "u2");

    let resp = client
        .post(format!("{}/api/push/subscriptions", base_url))
        .bearer_auth(&user)
        .json(&serde_json::json!({
            "endpoint": "https://push.example/dev1",
            "keys": { "p256dh": url_safe_key(b"k1"), "auth": url_safe_key(b"a1") }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Re-registering the same endpoint upserts rather than duplicating.
    let resp = client
        .post(format!("{}/api/push/subscriptions", base_url))
        .bearer_auth(&user)
        .json(&serde_json::json!({
            "endpoint": "https://push.example/dev1",
            "keys": { "p256dh": url_safe_key(b"k2"), "auth": url_safe_key(b"a2") }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let listed: serde_json::Value = client
        .get(format!("{}/api/push/subscriptions", base_url))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let resp = client
        .delete(format!("{}/api/push/subscriptions", base_url))
        .bearer_auth(&user)
        .json(&serde_json::json!({ "endpoint": "https://push.example/dev1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let listed: serde_json::Value = client
        .get(format!("{}/api/push/subscriptions", base_url))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.as_array().unwrap().is_empty());
}
