//! C9: token service — issuance, verification, revocation (spec §4.9).

pub mod fingerprint;
pub mod middleware;

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::db::revoked_tokens;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub fingerprint_hash: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub raw_fingerprint: String,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    key_id: String,
    issuer: String,
    expiration: Duration,
    pool: PgPool,
}

impl TokenService {
    pub fn new(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        key_id: &str,
        issuer: &str,
        expiration: Duration,
        pool: PgPool,
    ) -> Result<Self, AppError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| AppError::Config(format!("invalid RSA private key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| AppError::Config(format!("invalid RSA public key: {e}")))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            key_id: key_id.to_string(),
            issuer: issuer.to_string(),
            expiration,
            pool,
        })
    }

    /// Issues a token for `subject`/`role`; returns the token plus the raw
    /// fingerprint to deliver as an HttpOnly cookie (spec §4.9).
    pub fn issue(&self, subject: &str, role: &str) -> Result<IssuedToken, AppError> {
        let raw_fingerprint = fingerprint::generate();
        let fingerprint_hash = fingerprint::hash(&raw_fingerprint);

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            role: role.to_string(),
            fingerprint_hash,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.expiration.as_secs() as i64,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key_id.clone());

        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {e}")))?;

        Ok(IssuedToken { token, raw_fingerprint })
    }

    /// Verifies a bearer token against the fingerprint cookie (spec §4.9).
    /// No distinguishing signal is returned between "expired" and "revoked"
    /// — both fail the same way to an unauthenticated caller.
    pub async fn verify(&self, token: &str, cookie_fingerprint: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.leeway = 60;

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::Unauthenticated("invalid token".into()))?;

        let expected_hash = fingerprint::hash(cookie_fingerprint);
        if !constant_time_eq(expected_hash.as_bytes(), data.claims.fingerprint_hash.as_bytes()) {
            return Err(AppError::Unauthenticated("fingerprint mismatch".into()));
        }

        let digest = token_digest(token);
        if revoked_tokens::is_revoked(&self.pool, &digest)
            .await
            .map_err(AppError::Db)?
        {
            return Err(AppError::Unauthenticated("invalid token".into()));
        }

        Ok(data.claims)
    }

    pub async fn revoke(&self, token: &str, user_email: &str, reason: &str, expires_at: chrono::DateTime<chrono::Utc>) -> Result<(), AppError> {
        let digest = token_digest(token);
        revoked_tokens::revoke(&self.pool, &digest, user_email, reason, expires_at)
            .await
            .map_err(AppError::Db)
    }

    pub async fn sweep_expired(&self) -> Result<u64, AppError> {
        revoked_tokens::sweep_expired(&self.pool).await.map_err(AppError::Db)
    }
}

fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    fingerprint::hex::encode(digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.len() == b.len() && a.ct_eq(b).unwrap_u8() == 1
}
