use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Compute base64(HMAC-SHA256(secret, body)).
pub fn sign(body: &[u8], secret: &str) -> Result<String, String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| format!("HMAC error: {e}"))?;
    mac.update(body);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify a webhook signature against the raw, unparsed body.
///
/// Fails closed: an empty secret, an empty header or any computation error
/// is treated the same as a mismatch.
pub fn verify_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    if secret.is_empty() || signature.is_empty() {
        return false;
    }
    match sign(body, secret) {
        Ok(expected) => constant_time_eq(expected.as_bytes(), signature.as_bytes()),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
