use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

/// Compute HMAC-SHA256 of `payload` using `secret`.
/// Returns the header form, `sha256=<lowercase hex>`.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    format!("{}{}", PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Check a signature header against `payload`. Accepts `sha256=<hex>` or bare
/// hex; comparison is constant time.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let hex_sig = signature.trim();
    let hex_sig = hex_sig.strip_prefix(PREFIX).unwrap_or(hex_sig);

    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
