//! Push transport: delivers sealed payloads to registered device
//! endpoints. The trait seam lets tests substitute a scripted transport;
//! production uses the HTTP implementation below.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::db::models::PushSubscriptionRow;

/// Outcome of one push send. Permanent means the endpoint is gone and
/// the subscription must be dropped; Transient is logged and absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    Transient,
    Permanent,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver one sealed payload to the subscription's endpoint.
    /// Never errors: every failure mode collapses into an outcome.
    async fn send(&self, subscription: &PushSubscriptionRow, sealed: &[u8]) -> PushOutcome;
}

/// Seal a payload under a subscription's key material: AES-256-GCM with a
/// key derived from the content-encryption key and the auth secret bound
/// as associated data. Output is nonce || ciphertext.
pub fn seal_payload(p256dh: &str, auth: &str, plaintext: &[u8]) -> Result<Vec<u8>, String> {
    let key_material = URL_SAFE_NO_PAD
        .decode(p256dh)
        .map_err(|e| format!("bad content-encryption key: {}", e))?;
    let auth_secret = URL_SAFE_NO_PAD
        .decode(auth)
        .map_err(|e| format!("bad auth secret: {}", e))?;

    let key = Sha256::digest(&key_material);
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| format!("cipher init failed: {}", e))?;

    let nonce_bytes: [u8; 12] = rand::rng().random();
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &auth_secret,
            },
        )
        .map_err(|e| format!("encryption failed: {}", e))?;

    let mut sealed = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Production transport: POSTs the sealed payload to the endpoint URL.
/// 404/410 from the push service mean the endpoint no longer exists;
/// anything else that fails is transient.
pub struct HttpPushTransport {
    client: reqwest::Client,
}

impl HttpPushTransport {
    /// A transport without the timeout would hang on a stalled endpoint,
    /// so a builder failure is surfaced instead of falling back.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, subscription: &PushSubscriptionRow, sealed: &[u8]) -> PushOutcome {
        let response = self
            .client
            .post(&subscription.endpoint)
            .header("Content-Type", "application/octet-stream")
            .header("TTL", "60")
            .body(sealed.to_vec())
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    PushOutcome::Delivered
                } else if status == reqwest::StatusCode::NOT_FOUND
                    || status == reqwest::StatusCode::GONE
                {
                    PushOutcome::Permanent
                } else {
                    tracing::warn!(
                        endpoint = %subscription.endpoint,
                        status = %status,
                        "Push endpoint returned failure"
                    );
                    PushOutcome::Transient
                }
            }
            Err(e) => {
                tracing::warn!(
                    endpoint = %subscription.endpoint,
                    error = %e,
                    "Push send failed"
                );
                PushOutcome::Transient
            }
        }
    }
}
