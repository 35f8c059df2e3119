//! C3: distributed token bucket rate limiter (spec §4.3).
//!
//! Runs after authentication so the authenticated principal is available;
//! falls back to the first hop of the forwarded-for chain otherwise.

use crate::kv::KvStore;

pub fn principal_key(authenticated_subject: Option<&str>, forwarded_for: Option<&str>, remote_addr: &str) -> String {
    if let Some(subject) = authenticated_subject {
        return format!("user:{subject}");
    }
    let addr = forwarded_for
        .and_then(|h| h.split(',').next())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(remote_addr);
    format!("addr:{addr}")
}

pub async fn check(
    kv: &KvStore,
    principal: &str,
    requests_per_minute: u32,
) -> Result<bool, redis::RedisError> {
    kv.take_token(principal, requests_per_minute, std::time::Duration::from_secs(60))
        .await
}
