//! Customer approval tokens.
//!
//! The raw token travels only inside the capability URL; the store keeps a
//! keyed hash (`HMAC-SHA256(secret, token)`). Verification recomputes the MAC
//! and compares in constant time via [`hmac::Mac::verify_slice`].

use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Token entropy in bytes. 16 bytes = 128 bits, the floor for an
/// unguessable single-use credential.
const TOKEN_BYTES: usize = 16;

/// Generate a fresh random token, hex-encoded (32 chars).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Keyed hash of a token, hex-encoded, suitable for storage.
pub fn hash_token(secret: &SecretString, token: &str) -> String {
    let mac = mac_for(secret, token);
    hex_encode(&mac.finalize().into_bytes())
}

/// Constant-time check of a presented token against a stored hash.
pub fn verify_token(secret: &SecretString, token: &str, stored_hash: &str) -> bool {
    let Some(expected) = hex_decode(stored_hash) else {
        return false;
    };
    mac_for(secret, token).verify_slice(&expected).is_ok()
}

/// Capability URL handed to the customer; the token is the sole credential.
pub fn approval_url(public_base_url: &str, job_id: &str, token: &str) -> String {
    format!("{}/approve/{job_id}?t={token}", public_base_url.trim_end_matches('/'))
}

fn mac_for(secret: &SecretString, token: &str) -> HmacSha256 {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("hmac key of any length is accepted");
    mac.update(token.as_bytes());
    mac
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn hex_decode(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|idx| u8::from_str_radix(input.get(idx..idx + 2)?, 16).ok())
        .collect()
}
