//! `X-Hub-Signature-256` check for Graph webhook deliveries.
//!
//! The platform signs the raw request body with the app secret (HMAC-SHA256)
//! and sends `sha256=<lowercase hex>`. The legacy `X-Hub-Signature` header
//! (`sha1=`) is not accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

fn mac_for(app_secret: &str, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).ok()?;
    mac.update(body);
    Some(mac)
}

/// Whether `header_value` is a valid signature of `body` under `app_secret`.
///
/// Comparison is constant-time. Anything other than `sha256=<hex>` fails.
#[must_use]
pub fn verify(app_secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(("sha256", digest_hex)) = header_value.trim().split_once('=') else {
        return false;
    };
    let Ok(digest) = hex::decode(digest_hex) else {
        return false;
    };

    mac_for(app_secret, body).is_some_and(|mac| mac.verify_slice(&digest).is_ok())
}

/// Header value the platform would send for `body`
#[must_use]
pub fn sign(app_secret: &str, body: &[u8]) -> String {
    mac_for(app_secret, body)
        .map(|mac| format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "app-secret";
    const DELIVERY: &[u8] = br#"{"object":"instagram","entry":[]}"#;

    #[test]
    fn test_signed_delivery_verifies() {
        let header = sign(SECRET, DELIVERY);
        assert!(header.starts_with("sha256="));
        assert_eq!(header.len(), "sha256=".len() + 64);
        assert!(verify(SECRET, DELIVERY, &header));
    }

    #[test]
    fn test_other_secret_or_body_is_rejected() {
        let header = sign(SECRET, DELIVERY);
        assert!(!verify("another-app", DELIVERY, &header));
        assert!(!verify(SECRET, br#"{"object":"page","entry":[]}"#, &header));
    }

    #[test]
    fn test_empty_body_has_its_own_signature() {
        let header = sign(SECRET, b"");
        assert!(verify(SECRET, b"", &header));
        assert!(!verify(SECRET, DELIVERY, &header));
    }

    #[test]
    fn test_legacy_sha1_header_is_rejected() {
        let digest = sign(SECRET, DELIVERY);
        let hex_part = digest.trim_start_matches("sha256=");
        assert!(!verify(SECRET, DELIVERY, &format!("sha1={hex_part}")));
        assert!(!verify(SECRET, DELIVERY, hex_part));
    }

    #[test]
    fn test_malformed_header_is_rejected() {
        assert!(!verify(SECRET, DELIVERY, ""));
        assert!(!verify(SECRET, DELIVERY, "sha256="));
        assert!(!verify(SECRET, DELIVERY, "sha256=zz"));
        assert!(!verify(SECRET, DELIVERY, "sha256=abc"));
    }
}
