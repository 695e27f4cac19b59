//! Webhook payload authentication.
//!
//! The provider signs the raw request body with HMAC-SHA256 and sends the hex
//! digest in `X-Webhook-Signature`. Verification must happen before any part
//! of the payload is trusted.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Verify a hex HMAC-SHA256 signature over the raw body using constant-time
/// comparison.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> Result<(), AppError> {
    let expected = hex::decode(signature_hex).map_err(|_| AppError::SignatureInvalid)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("invalid webhook secret configuration".to_string()))?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| AppError::SignatureInvalid)
}

/// Hex HMAC-SHA256 of a body, as the provider would compute it. Used by the
/// test suites to build authentic webhook deliveries.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"order_id":"ord-1"}"#;
        let signature = sign("secret", body);
        assert!(verify_signature("secret", body, &signature).is_ok());
    }

    #[test]
    fn tampered_body_fails_verification() {
        let signature = sign("secret", b"original");
        assert!(matches!(
            verify_signature("secret", b"tampered", &signature),
            Err(AppError::SignatureInvalid)
        ));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let body = b"payload";
        let signature = sign("secret-a", body);
        assert!(matches!(
            verify_signature("secret-b", body, &signature),
            Err(AppError::SignatureInvalid)
        ));
    }

    #[test]
    fn non_hex_signature_fails_verification() {
        assert!(matches!(
            verify_signature("secret", b"payload", "not-hex!"),
            Err(AppError::SignatureInvalid)
        ));
    }
}
