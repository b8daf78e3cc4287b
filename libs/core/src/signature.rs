use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 HMAC-SHA256 digest of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Checks `signature` against the digest of `body` under the channel secret.
///
/// A missing, blank or non-base64 header is treated the same as a mismatch.
///
/// ```
/// use linkbot_core::{sign_body, verify_signature};
///
/// let sig = sign_body("secret", b"{}");
/// assert!(verify_signature("secret", b"{}", Some(&sig)).is_ok());
/// assert!(verify_signature("other", b"{}", Some(&sig)).is_err());
/// ```
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), WebhookError> {
    let signature = signature
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(WebhookError::InvalidSignature)?;
    let provided = B64
        .decode(signature)
        .map_err(|_| WebhookError::InvalidSignature)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Computes the `x-line-signature` value for `body`.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail here.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    B64.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn random_secret() -> String {
        let mut buf = [0u8; 32];
        let mut rng = rand::rng();
        rng.fill_bytes(&mut buf);
        B64.encode(buf)
    }

    #[test]
    fn accepts_digest_of_body() {
        let secret = random_secret();
        let body = br#"{"destination":"U0","events":[]}"#;
        let sig = sign_body(&secret, body);
        assert!(verify_signature(&secret, body, Some(&sig)).is_ok());
    }

    #[test]
    fn accepts_surrounding_whitespace_in_header() {
        let body = b"payload";
        let sig = format!(" {} ", sign_body("secret", body));
        assert!(verify_signature("secret", body, Some(&sig)).is_ok());
    }

    #[test]
    fn rejects_digest_under_other_secret() {
        let body = b"payload";
        let sig = sign_body("first", body);
        assert!(matches!(
            verify_signature("second", body, Some(&sig)),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_tampered_body() {
        let sig = sign_body("secret", b"payload");
        assert!(matches!(
            verify_signature("secret", b"payload!", Some(&sig)),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_missing_blank_and_garbage_headers() {
        for header in [None, Some(""), Some("   "), Some("not base64 at all!")] {
            assert!(matches!(
                verify_signature("secret", b"payload", header),
                Err(WebhookError::InvalidSignature)
            ));
        }
    }

    #[test]
    fn rejects_truncated_digest() {
        let full = B64.decode(sign_body("secret", b"payload")).unwrap();
        let truncated = B64.encode(&full[..16]);
        assert!(verify_signature("secret", b"payload", Some(&truncated)).is_err());
    }
}
