//! Fingerprint binding (spec §4.9, GLOSSARY): a token-to-session binding
//! via a hashed nonce split between cookie and token claim.

use rand::RngCore;
use sha2::{Digest, Sha256};

pub const FINGERPRINT_COOKIE: &str = "cw_fp";

/// Generates 32 random bytes, base64-encoded, to hand to the client as an
/// HttpOnly cookie.
pub fn generate() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

/// The SHA-256 digest embedded in the token claim.
pub fn hash(raw_fingerprint: &str) -> String {
    let digest = Sha256::digest(raw_fingerprint.as_bytes());
    hex::encode(digest)
}

pub mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
