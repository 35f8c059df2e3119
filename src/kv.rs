//! Thin wrapper over the shared ephemeral store (spec §6.2 key layout).
//!
//! The only authoritative place for cross-replica coordination (spec §5):
//! nonce reservation and rate-limit bucket state both live here so that
//! every replica of this service observes the same state.

use std::time::Duration;

use redis::{AsyncCommands, ExistenceCheck, SetExpiry, SetOptions};

#[derive(Clone)]
pub struct KvStore {
    manager: redis::aio::ConnectionManager,
}

impl KvStore {
    pub async fn connect(url: &str, password: Option<&str>) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let client = if let Some(password) = password {
            let mut info = client.get_connection_info().clone();
            info.redis.password = Some(password.to_string());
            redis::Client::open(info)?
        } else {
            client
        };
        let manager = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    /// Atomic set-if-absent with TTL; returns `true` iff this call won the
    /// reservation (spec §4.2 step 4).
    ///
    /// A single `SET key val NX EX ttl` command, not a `SETNX` followed by
    /// a separate `EXPIRE`: two commands leave a window where a crash
    /// between them strands a nonce with no TTL, turning a one-time replay
    /// window into a permanent rejection for that nonce.
    pub async fn reserve_nonce(
        &self,
        nonce: &str,
        ttl: Duration,
    ) -> Result<bool, redis::RedisError> {
        let key = format!("webhook:nonce:{nonce}");
        let mut conn = self.manager.clone();
        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .with_expiration(SetExpiry::EX(ttl.as_secs()));
        let reserved: bool = conn.set_options(&key, "1", options).await?;
        Ok(reserved)
    }

    /// Atomic compare-and-set token bucket refill/consume (spec §4.3, §6.2).
    ///
    /// Returns `true` if a token was available and consumed. Implemented as
    /// a Lua script so the read-decrement-write is a single atomic op on the
    /// server, matching the "no read-check-write window" discipline used for
    /// the cooldown gate (spec §4.6) but over the KV store instead of SQL.
    pub async fn take_token(
        &self,
        principal: &str,
        capacity: u32,
        window: Duration,
    ) -> Result<bool, redis::RedisError> {
        const SCRIPT: &str = r#"
            local key = KEYS[1]
            local capacity = tonumber(ARGV[1])
            local window = tonumber(ARGV[2])
            local now = tonumber(ARGV[3])

            local bucket = redis.call('HMGET', key, 'tokens', 'ts')
            local tokens = tonumber(bucket[1])
            local ts = tonumber(bucket[2])

            if tokens == nil then
                tokens = capacity
                ts = now
            end

            local elapsed = now - ts
            if elapsed > 0 then
                local refill = (elapsed / window) * capacity
                tokens = math.min(capacity, tokens + refill)
                ts = now
            end

            local allowed = 0
            if tokens >= 1 then
                tokens = tokens - 1
                allowed = 1
            end

            redis.call('HMSET', key, 'tokens', tokens, 'ts', ts)
            redis.call('EXPIRE', key, window * 2)
            return allowed
        "#;

        let key = format!("rate-limit:{principal}");
        let mut conn = self.manager.clone();
        let now = chrono::Utc::now().timestamp() as f64;
        let allowed: i32 = redis::Script::new(SCRIPT)
            .key(&key)
            .arg(capacity)
            .arg(window.as_secs())
            .arg(now)
            .invoke_async(&mut conn)
            .await?;
        Ok(allowed == 1)
    }
}
