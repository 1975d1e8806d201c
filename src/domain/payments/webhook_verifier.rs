//! Stripe webhook signature verification.
//!
//! Verifies the `Stripe-Signature` header against the byte-exact request
//! body using HMAC-SHA256 and constant-time comparison, then decodes the
//! minimal event header needed to claim the event id.
//!
//! Raw-body discipline is contractual: any byte mutation between receipt
//! and verification (re-encoding, whitespace normalization) invalidates
//! the signature and the delivery is rejected.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::webhook_errors::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Default acceptance window for the signed timestamp (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Parsed components of the Stripe-Signature header.
///
/// Format: `t=<timestamp>,v1=<signature>(,v1=<signature>)*`. Stripe sends
/// multiple v1 entries while a secret rotation is in flight; verification
/// succeeds when any of them matches. Unknown pairs are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// All v1 signatures (HMAC-SHA256), decoded from hex.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a Stripe-Signature header string.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::SignatureMalformed` if the timestamp or every
    /// v1 entry is missing, or a component fails to decode.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures: Vec<Vec<u8>> = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=').ok_or_else(|| {
                WebhookError::SignatureMalformed("invalid header format".to_string())
            })?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::SignatureMalformed("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value).map_err(|_| {
                        WebhookError::SignatureMalformed("invalid v1 signature hex".to_string())
                    })?);
                }
                _ => {
                    // Ignore unknown fields for forward compatibility
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            WebhookError::SignatureMalformed("missing timestamp".to_string())
        })?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::SignatureMalformed(
                "missing v1 signature".to_string(),
            ));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Minimal event header decoded from a verified payload.
///
/// Carries exactly what the pipeline needs before full parsing: the id to
/// claim, the type for dispatch, and the provider-side creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    /// Provider event id (evt_xxx).
    pub id: String,
    /// Event type string.
    pub event_type: String,
    /// Provider creation time, unix seconds, when present.
    pub created: Option<i64>,
    /// Whether the event was generated in live mode.
    pub livemode: bool,
}

/// Verifier for Stripe webhook signatures.
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    /// Creates a verifier with the default 5-minute tolerance.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Overrides the timestamp acceptance window.
    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verifies the webhook signature and decodes the event header.
    ///
    /// # Verification Steps
    ///
    /// 1. Parse the signature header
    /// 2. Reject timestamps outside the acceptance window
    /// 3. Compute HMAC-SHA256 over `"{timestamp}.{raw_body}"`
    /// 4. Constant-time compare against every v1 signature
    /// 5. Decode the payload's `id`, `type`, `created`, `livemode`
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<EventHeader, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        self.validate_timestamp(header.timestamp)?;

        let expected = self.compute_signature(header.timestamp, payload);
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        decode_header(payload)
    }

    fn validate_timestamp(&self, timestamp: i64) -> Result<(), WebhookError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age.abs() > self.tolerance_secs {
            return Err(WebhookError::TimestampOutOfTolerance { age_secs: age });
        }

        Ok(())
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Decodes the minimal event header from a verified payload.
///
/// Requires top-level string `id` and `type`; `created` and `livemode`
/// are optional.
fn decode_header(payload: &[u8]) -> Result<EventHeader, WebhookError> {
    let value: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WebhookError::MalformedPayload("missing event id".to_string()))?
        .to_string();

    let event_type = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| WebhookError::MalformedPayload("missing event type".to_string()))?
        .to_string();

    let created = value.get("created").and_then(|v| v.as_i64());
    let livemode = value
        .get("livemode")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Ok(EventHeader {
        id,
        event_type,
        created,
        livemode,
    })
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes a hex-encoded HMAC-SHA256 for use in test fixtures.
#[cfg(test)]
pub fn compute_test_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
