//! Webhook signature verification.
//!
//! The gateway signs the raw request body with HMAC-SHA512 under a shared
//! secret and sends the lowercase hex digest in a header. The body must be
//! verified byte-for-byte before it is parsed.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Why a webhook was not authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No signature header
    #[error("missing signature")]
    Missing,
    /// Header is not hex
    #[error("signature is not valid hex")]
    Malformed,
    /// Digest does not match the body
    #[error("signature mismatch")]
    Mismatch,
    /// No webhook secret configured; every webhook is refused
    #[error("webhook secret not configured")]
    NotConfigured,
}

/// HMAC-SHA512 verifier for webhook bodies.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Create a verifier for a shared secret.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha512, SignatureError> {
        if self.secret.is_empty() {
            return Err(SignatureError::NotConfigured);
        }
        HmacSha512::new_from_slice(&self.secret).map_err(|_| SignatureError::NotConfigured)
    }

    /// Check `signature` (hex) against `body` in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] unless the signature matches.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SignatureError::Missing)?;
        let expected = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Hex signature for `body`, as the gateway would compute it.
    ///
    /// # Errors
    ///
    /// [`SignatureError::NotConfigured`] without a secret.
    pub fn sign(&self, body: &[u8]) -> Result<String, SignatureError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"paymentReference":"EVT-0011223344556677","status":"SUCCESSFUL"}"#;

    #[test]
    fn test_signed_body_verifies() {
        let verifier = WebhookVerifier::new("whsec_test");
        let signature = verifier.sign(BODY).unwrap();
        assert_eq!(signature.len(), 128);
        assert!(verifier.verify(BODY, Some(&signature)).is_ok());
        assert!(verifier.verify(BODY, Some(&signature.to_uppercase())).is_ok());
    }

    #[test]
    fn test_tampered_body_or_wrong_secret_fails() {
        let verifier = WebhookVerifier::new("whsec_test");
        let signature = verifier.sign(BODY).unwrap();

        let tampered = br#"{"paymentReference":"EVT-0011223344556677","status":"FAILED"}"#;
        assert_eq!(
            verifier.verify(tampered, Some(&signature)),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            WebhookVerifier::new("other").verify(BODY, Some(&signature)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_missing_malformed_and_unconfigured() {
        let verifier = WebhookVerifier::new("whsec_test");
        assert_eq!(verifier.verify(BODY, None), Err(SignatureError::Missing));
        assert_eq!(verifier.verify(BODY, Some("  ")), Err(SignatureError::Missing));
        assert_eq!(verifier.verify(BODY, Some("zz")), Err(SignatureError::Malformed));
        assert_eq!(
            WebhookVerifier::new("").verify(BODY, Some("abcd")),
            Err(SignatureError::NotConfigured)
        );
    }
}
