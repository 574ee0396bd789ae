//! Integration tests for trusted contacts: the five-contact cap, phone
//! validation, and owner scoping.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use lifeline_server::push::transport::{PushOutcome, PushTransport};

struct NullTransport;

#[async_trait::async_trait]
impl PushTransport for NullTransport {
    async fn send(
        &self,
        _subscription: &lifeline_server::db::models::PushSubscriptionRow,
        _sealed: &[u8],
    ) -> PushOutcome {
        PushOutcome::Delivered
    }
}

async fn start_test_server() -> (String, Vec<u8>) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = lifeline_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = lifeline_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = lifeline_server::state::AppState {
        db,
        jwt_secret: jwt_secret.clone(),
        connections: Arc::new(lifeline_server::ws::registry::ConnectionRegistry::new()),
        rooms: Arc::new(lifeline_server::ws::rooms::RoomManager::new()),
        push: Arc::new(NullTransport),
        push_enabled: false,
        push_timeout: Duration::from_secs(2),
    };

    let app = lifeline_server::routes::build_router(state);
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

    (format!("http://{}", addr), jwt_secret)
}

fn token_for(secret: &[u8], user_id: &str) -> String {
    lifeline_server::auth::jwt::issue_access_token(secret, user_id, false)
        .expect("Failed to issue token")
}

async fn add_contact(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    name: &str,
    phone: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/api/contacts", base_url))
        .bearer_auth(token)
        .json(&serde_json::json!({ "display_name": name, "phone": phone }))
        .send()
        .await
        .expect("add contact request failed")
}

async fn list_contacts(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
) -> Vec<serde_json::Value> {
    client
        .get(format!("{}/api/contacts", base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap()
        .as_array()
        .unwrap()
        .clone()
}

#[tokio::test]
async fn contact_cap_is_five_and_deleting_frees_a_slot() {
    let (base_url, secret) = start_test_server().await;
    let client = reqwest::Client::new();
    let token = token_for(&secret, "u1");

    for i in 0..5 {
        let resp = add_contact(
            &client,
            &base_url,
            &token,
            &format!("Contact {}", i),
            &format!("+234801234567{}", i),
        )
        .await;
        assert_eq!(resp.status(), 201);
    }

    // The sixth is refused and the list stays at five.
    let resp = add_contact(&client, &base_url, &token, "One Too Many", "+2348099999999").await;
    assert_eq!(resp.status(), 409);
    let contacts = list_contacts(&client, &base_url, &token).await;
    assert_eq!(contacts.len(), 5);

    // Deleting one frees a slot.
    let victim_id = contacts[0]["id"].as_str().unwrap();
    let resp = client
        .delete(format!("{}/api/contacts/{}", base_url, victim_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = add_contact(&client, &base_url, &token, "Replacement", "+2348099999999").await;
    assert_eq!(resp.status(), 201);
    assert_eq!(list_contacts(&client, &base_url, &token).await.len(), 5);
}

#[tokio::test]
async fn malformed_contacts_are_rejected() {
    let (base_url, secret) = start_test_server().await;
    let client = reqwest::Client::new();
    let token = token_for(&secret, "u1");

    for phone in ["08012345678", "+0123456789", "+123", "not-a-number"] {
        let resp = add_contact(&client, &base_url, &token, "Ada", phone).await;
        assert_eq!(resp.status(), 422, "phone {:?} should be rejected", phone);
    }

    // Blank name is rejected too.
    let resp = add_contact(&client, &base_url, &token, "   ", "+2348012345678").await;
    assert_eq!(resp.status(), 422);

    assert!(list_contacts(&client, &base_url, &token).await.is_empty());
}

#[tokio::test]
async fn contacts_are_owner_scoped() {
    let (base_url, secret) = start_test_server().await;
    let client = reqwest::Client::new();
    let owner = token_for(&secret, "u1");
    let other = token_for(&secret, "u2");

    let resp = add_contact(&client, &base_url, &owner, "Ada", "+2348012345678").await;
    assert_eq!(resp.status(), 201);
    let contact: serde_json::Value = resp.json().await.unwrap();
    let contact_id = contact["id"].as_str().unwrap();

    // The other identity sees nothing and cannot delete across owners.
    assert!(list_contacts(&client, &base_url, &other).await.is_empty());
    let resp = client
        .delete(format!("{}/api/contacts/{}", base_url, contact_id))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(list_contacts(&client, &base_url, &owner).await.len(), 1);
}

#[tokio::test]
async fn linked_contact_round_trips_linked_user_id() {
    let (base_url, secret) = start_test_server().await;
    let client = reqwest::Client::new();
    let token = token_for(&secret, "u1");

    let resp = client
        .post(format!("{}/api/contacts", base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "display_name": "Ada",
            "phone": "+2348012345678",
            "linked_user_id": "u2"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let contact: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(contact["linked_user_id"], "u2");

    let contacts = list_contacts(&client, &base_url, &token).await;
    assert_eq!(contacts[0]["linked_user_id"], "u2");
}
