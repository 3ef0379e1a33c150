//! Webhook signature generation and verification
//!
//! Providers sign `"{timestamp}.{raw body}"` with HMAC-SHA256 using the
//! shared secret and send the hex digest alongside the Unix timestamp. The
//! timestamp is signed exactly as it appears in the header.

use crate::{Result, WebhookError};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Prefix some providers put in front of the hex digest
pub const SIGNATURE_SCHEME: &str = "sha256=";

/// Webhook signature utilities
#[derive(Debug, Clone)]
pub struct WebhookSignature {
    secret: SecretString,
}

impl WebhookSignature {
    /// Create a new signature utility with the given secret
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> String {
        self.sign_raw(&timestamp.to_string(), payload)
    }

    /// Hex HMAC-SHA256 over a timestamp kept as header text
    pub fn sign_raw(&self, timestamp: &str, payload: &[u8]) -> String {
        hex::encode(self.mac(timestamp, payload).finalize().into_bytes())
    }

    /// Signature in header form (`sha256=<hex>`)
    pub fn header_value(&self, timestamp: i64, payload: &[u8]) -> String {
        format!("{}{}", SIGNATURE_SCHEME, self.sign(timestamp, payload))
    }

    /// Verify a signature against the payload.
    ///
    /// The timestamp must be within `tolerance` of `now` in either direction.
    /// The digest comparison is constant time.
    pub fn verify(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
        now: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<()> {
        let timestamp = timestamp.trim();
        let seconds: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::TimestampInvalid("Invalid timestamp format".to_string()))?;

        let age = now.timestamp().abs_diff(seconds);
        if age > tolerance.as_secs() {
            return Err(WebhookError::TimestampInvalid(format!(
                "Timestamp outside tolerance: {} seconds (tolerance: {} seconds)",
                age,
                tolerance.as_secs()
            )));
        }

        let digest = signature.trim();
        let digest = digest.strip_prefix(SIGNATURE_SCHEME).unwrap_or(digest);
        let expected = hex::decode(digest)
            .map_err(|_| WebhookError::SignatureInvalid("Signature is not hex".to_string()))?;

        self.mac(timestamp, payload)
            .verify_slice(&expected)
            .map_err(|_| WebhookError::SignatureInvalid("Signature mismatch".to_string()))
    }

    fn mac(&self, timestamp: &str, payload: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC can take any size key");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

/// Header names for webhook signatures
pub mod headers {
    /// The signature header name
    pub const SIGNATURE: &str = "X-Webhook-Signature";

    /// Timestamp header (Unix seconds)
    pub const TIMESTAMP: &str = "X-Webhook-Timestamp";
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TOLERANCE: Duration = Duration::from_secs(300);

    fn signer(secret: &str) -> WebhookSignature {
        WebhookSignature::new(SecretString::from(secret.to_string()))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = signer("whsec_test");
        let payload = br#"{"id":"evt_1","type":"transaction.completed"}"#;

        let signature = signer.sign(1_700_000_000, payload);
        assert_eq!(signature.len(), 64);

        let result = signer.verify(payload, &signature, "1700000000", at(1_700_000_010), TOLERANCE);
        assert!(result.is_ok());
    }

    #[test]
    fn test_known_vector() {
        // HMAC-SHA256("key", "0.The quick brown fox")
        let signer = signer("key");
        let expected = {
            let mut mac = HmacSha256::new_from_slice(b"key").unwrap();
            mac.update(b"0.The quick brown fox");
            hex::encode(mac.finalize().into_bytes())
        };
        assert_eq!(signer.sign(0, b"The quick brown fox"), expected);
    }

    #[test]
    fn test_timestamp_signed_as_sent() {
        let signer = signer("whsec_test");
        let now = at(1_700_000_000);

        for raw in ["+1700000000", "01700000000"] {
            let signature = signer.sign_raw(raw, b"body");
            assert!(signer.verify(b"body", &signature, raw, now, TOLERANCE).is_ok());
            assert!(signer.verify(b"body", &signature, "1700000000", now, TOLERANCE).is_err());
        }

        let signature = signer.sign(1_700_000_000, b"body");
        assert!(signer.verify(b"body", &signature, " 1700000000 ", now, TOLERANCE).is_ok());
    }

    #[test]
    fn test_prefixed_signature() {
        let signer = signer("whsec_test");
        let header = signer.header_value(1_700_000_000, b"body");
        assert!(header.starts_with("sha256="));

        assert!(signer.verify(b"body", &header, "1700000000", at(1_700_000_000), TOLERANCE).is_ok());
    }

    #[test]
    fn test_verify_wrong_secret() {
        let signature = signer("secret1").sign(1_700_000_000, b"test payload");

        let result = signer("secret2").verify(
            b"test payload",
            &signature,
            "1700000000",
            at(1_700_000_000),
            TOLERANCE,
        );
        assert!(matches!(result, Err(WebhookError::SignatureInvalid(_))));
    }

    #[test]
    fn test_verify_tampered_body() {
        let signer = signer("whsec_test");
        let signature = signer.sign(1_700_000_000, br#"{"amount":"10.00"}"#);

        let result = signer.verify(
            br#"{"amount":"99.00"}"#,
            &signature,
            "1700000000",
            at(1_700_000_000),
            TOLERANCE,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_timestamp_window() {
        let signer = signer("whsec_test");
        let signature = signer.sign(1_700_000_000, b"payload");

        // Exactly at the edge is accepted, one second past is not
        assert!(signer.verify(b"payload", &signature, "1700000000", at(1_700_000_300), TOLERANCE).is_ok());
        assert!(matches!(
            signer.verify(b"payload", &signature, "1700000000", at(1_700_000_301), TOLERANCE),
            Err(WebhookError::TimestampInvalid(_))
        ));
        // Future timestamps are bounded too
        assert!(signer.verify(b"payload", &signature, "1700000000", at(1_699_999_000), TOLERANCE).is_err());
    }

    #[test]
    fn test_verify_garbage() {
        let signer = signer("whsec_test");
        assert!(matches!(
            signer.verify(b"payload", "not-hex", "1700000000", at(1_700_000_000), TOLERANCE),
            Err(WebhookError::SignatureInvalid(_))
        ));
        assert!(matches!(
            signer.verify(b"payload", "abcd", "yesterday", at(1_700_000_000), TOLERANCE),
            Err(WebhookError::TimestampInvalid(_))
        ));
    }
}
