//! C2 authenticity filter: HMAC verification, timestamp freshness, and
//! nonce-based replay defense (spec §4.2, §7, §8 property 7, scenario S4).
//!
//! Requires a reachable shared ephemeral store; point `REDIS_URL` at a
//! scratch instance the way `DATABASE_URL` points `sqlx::test` at a scratch
//! schema.

use std::time::Duration;

use chainwatch::kv::KvStore;
use chainwatch::webhook::authenticity::{verify, AuthenticityHeaders};
use hmac::{Hmac, Mac};
use sha2::Sha256;

const SECRET: &[u8] = b"01234567890123456789012345678901";
const FRESHNESS: Duration = Duration::from_secs(300);

async fn kv() -> KvStore {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    KvStore::connect(&url, None)
        .await
        .expect("redis must be reachable for authenticity tests")
}

fn sign(secret: &[u8], timestamp: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[tokio::test]
async fn valid_request_passes() {
    let kv = kv().await;
    let body = br#"{"apply":[]}"#;
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let nonce = uuid::Uuid::new_v4().to_string();
    let signature = sign(SECRET, &timestamp, body);

    let headers = AuthenticityHeaders {
        signature: Some(&signature),
        timestamp: Some(&timestamp),
        nonce: Some(&nonce),
    };

    verify(headers, body, SECRET, FRESHNESS, &kv)
        .await
        .expect("well-formed, freshly-signed request must pass");
}

#[tokio::test]
async fn stale_timestamp_is_rejected() {
    let kv = kv().await;
    let body = br#"{"apply":[]}"#;
    let timestamp = (chrono::Utc::now().timestamp() - 301).to_string();
    let nonce = uuid::Uuid::new_v4().to_string();
    let signature = sign(SECRET, &timestamp, body);

    let headers = AuthenticityHeaders {
        signature: Some(&signature),
        timestamp: Some(&timestamp),
        nonce: Some(&nonce),
    };

    let error = verify(headers, body, SECRET, FRESHNESS, &kv).await.unwrap_err();
    assert!(error.to_string().contains("stale") || error.to_string().contains("authenticity"));
}

#[tokio::test]
async fn replayed_nonce_is_rejected_on_second_use() {
    let kv = kv().await;
    let body = br#"{"apply":[]}"#;
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let nonce = uuid::Uuid::new_v4().to_string();
    let signature = sign(SECRET, &timestamp, body);

    let headers = AuthenticityHeaders {
        signature: Some(&signature),
        timestamp: Some(&timestamp),
        nonce: Some(&nonce),
    };
    verify(headers, body, SECRET, FRESHNESS, &kv)
        .await
        .expect("first use of the nonce succeeds");

    // Same nonce, same signature, replayed verbatim (scenario S4).
    let headers = AuthenticityHeaders {
        signature: Some(&signature),
        timestamp: Some(&timestamp),
        nonce: Some(&nonce),
    };
    let error = verify(headers, body, SECRET, FRESHNESS, &kv).await.unwrap_err();
    assert!(error.to_string().to_lowercase().contains("nonce") || error.to_string().contains("authenticity"));
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let kv = kv().await;
    let body = br#"{"apply":[]}"#;
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let nonce = uuid::Uuid::new_v4().to_string();
    let mut signature = sign(SECRET, &timestamp, body);
    // Flip one hex character so the signature no longer matches.
    signature.replace_range(0..1, if &signature[0..1] == "0" { "1" } else { "0" });

    let headers = AuthenticityHeaders {
        signature: Some(&signature),
        timestamp: Some(&timestamp),
        nonce: Some(&nonce),
    };

    assert!(verify(headers, body, SECRET, FRESHNESS, &kv).await.is_err());
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let kv = kv().await;
    let body = br#"{"apply":[]}"#;
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let nonce = uuid::Uuid::new_v4().to_string();

    let headers = AuthenticityHeaders {
        signature: None,
        timestamp: Some(&timestamp),
        nonce: Some(&nonce),
    };

    assert!(verify(headers, body, SECRET, FRESHNESS, &kv).await.is_err());
}
