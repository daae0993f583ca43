//! HMAC-SHA256 signatures for inbound gateway and shipment provider callbacks.
//!
//! The signature header carries the lowercase hex digest of `HMAC-SHA256(secret, message)`. For webhooks the message
//! is the raw, unparsed request body. For client redirect confirmations it is `order_ref|payment_id`.
//!
//! Comparison is constant-time. Verification never fails loudly: malformed input simply does not verify.
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Returns `true` if `signature` is the hex HMAC-SHA256 of `message` under `secret`.
///
/// Returns `false` for an empty secret, an empty or non-hex signature, or a digest mismatch.
pub fn verify(message: &[u8], signature: &str, secret: &str) -> bool {
    if secret.is_empty() {
        warn!("🔐️ Refusing to verify a signature against an empty secret");
        return false;
    }
    let provided = match hex::decode(signature.trim()) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => {
            debug!("🔐️ Signature is not valid hex");
            return false;
        },
    };
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(message);
    mac.verify_slice(&provided).is_ok()
}

/// Verifies the signature on a client redirect confirmation, which signs `order_ref|payment_id`.
pub fn verify_client_confirmation(order_ref: &str, payment_id: &str, signature: &str, secret: &str) -> bool {
    verify(confirmation_message(order_ref, payment_id).as_bytes(), signature, secret)
}

/// Produces the lowercase hex HMAC-SHA256 of `message`.
pub fn sign(message: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::default(),
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

pub fn sign_client_confirmation(order_ref: &str, payment_id: &str, secret: &str) -> String {
    sign(confirmation_message(order_ref, payment_id).as_bytes(), secret)
}

fn confirmation_message(order_ref: &str, payment_id: &str) -> String {
    format!("{order_ref}|{payment_id}")
}
