use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::error::WebhookError;
use super::event::{VerifiedPayload, decode_payload};

type HmacSha256 = Hmac<Sha256>;

/// Default accepted clock skew between the signed timestamp and now.
pub const DEFAULT_TOLERANCE_SECONDS: u64 = 300;

/// How a verifier authenticates payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    /// HMAC signature checked against the shared secret.
    Signed,
    /// No secret configured; payloads are trusted as-is.
    Unverified,
}

/// Authenticates a raw webhook body and parses it.
///
/// Implementations must check the signature over the exact bytes received and
/// only then decode them.
pub trait WebhookVerifier: Send + Sync {
    /// Verify `payload` against the signature header value and parse it.
    fn verify(&self, payload: &[u8], signature: Option<&str>)
    -> Result<VerifiedPayload, WebhookError>;

    fn mode(&self) -> VerificationMode;
}

/// Verifier for Stripe's `Stripe-Signature` scheme.
///
/// The header looks like `t=1700000000,v1=5257a8...,v1=...`. Each `v1` entry is
/// a hex HMAC-SHA256 of `"{t}.{payload}"` keyed by the endpoint secret; several
/// appear while a secret is being rolled. The timestamp must be within the
/// tolerance window in either direction.
///
/// The secret is held in a [`SecretString`] so it never shows up in debug output.
pub struct StripeSignatureVerifier {
    secret: SecretString,
    tolerance: Duration,
}

impl StripeSignatureVerifier {
    #[must_use]
    pub fn new(secret: impl Into<SecretString>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: Duration::from_secs(DEFAULT_TOLERANCE_SECONDS),
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Verify against an explicit clock, in Unix seconds.
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> Result<VerifiedPayload, WebhookError> {
        let header = match signature.map(str::trim) {
            Some(h) if !h.is_empty() => h,
            _ => {
                tracing::warn!(
                    target: "payhook::webhooks::verification",
                    "Webhook rejected: no signature header"
                );
                return Err(WebhookError::MissingSignature);
            }
        };

        let parts = parse_signature_header(header).ok_or_else(|| {
            tracing::warn!(
                target: "payhook::webhooks::verification",
                "Webhook rejected: unparsable signature header"
            );
            WebhookError::InvalidSignature
        })?;

        let expected = self.compute(payload, parts.timestamp);
        let matched = parts
            .signatures
            .iter()
            .filter_map(|sig| hex::decode(sig).ok())
            .any(|provided| constant_time_compare(&expected, &provided));

        if !matched {
            tracing::warn!(
                target: "payhook::webhooks::verification",
                "Webhook rejected: signature mismatch"
            );
            return Err(WebhookError::InvalidSignature);
        }

        // `t` is attacker-chosen; saturate rather than overflow
        let age = now.saturating_sub(parts.timestamp);
        if age.unsigned_abs() > self.tolerance.as_secs() {
            tracing::warn!(
                target: "payhook::webhooks::verification",
                age_seconds = age,
                "Webhook rejected: timestamp outside tolerance"
            );
            return Err(WebhookError::TimestampOutsideTolerance { age_seconds: age });
        }

        let event = decode_payload(payload)?;
        tracing::debug!(
            target: "payhook::webhooks::verification",
            event_id = %event.id,
            kind = %event.kind,
            "Webhook signature verified"
        );
        Ok(event)
    }

    /// Build a signature header for `payload`, as the processor would send it.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(self.compute(payload, timestamp))
        )
    }

    /// HMAC over the exact bytes `"{timestamp}.{payload}"`.
    ///
    /// The payload is fed as raw bytes; converting it to a string first would
    /// corrupt any non-UTF-8 body and break the signature.
    fn compute(&self, payload: &[u8], timestamp: i64) -> Vec<u8> {
        // HMAC-SHA256 accepts keys of any length, so this cannot fail
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.expose_secret().as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any size"));
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for StripeSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeSignatureVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier for StripeSignatureVerifier {
    fn verify(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<VerifiedPayload, WebhookError> {
        self.verify_at(payload, signature, chrono::Utc::now().timestamp())
    }

    fn mode(&self) -> VerificationMode {
        VerificationMode::Signed
    }
}

/// Degraded mode used when no signing secret is configured.
///
/// **WARNING:** accepts every payload without checking its origin. Startup
/// configuration refuses it in production; every request logs a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedMode;

impl WebhookVerifier for UnverifiedMode {
    fn verify(
        &self,
        payload: &[u8],
        _signature: Option<&str>,
    ) -> Result<VerifiedPayload, WebhookError> {
        tracing::warn!(
            target: "payhook::webhooks::verification",
            "Skipping webhook signature verification: no signing secret configured"
        );
        decode_payload(payload)
    }

    fn mode(&self) -> VerificationMode {
        VerificationMode::Unverified
    }
}

/// Pick the verifier for a (possibly absent) signing secret.
pub fn verifier_for_secret(
    secret: Option<SecretString>,
    tolerance: Duration,
) -> Arc<dyn WebhookVerifier> {
    match secret {
        Some(secret) => Arc::new(StripeSignatureVerifier::new(secret).with_tolerance(tolerance)),
        None => {
            tracing::warn!(
                target: "payhook::webhooks::verification",
                "No webhook signing secret configured; running in unverified mode"
            );
            Arc::new(UnverifiedMode)
        }
    }
}

struct SignatureParts {
    timestamp: i64,
    signatures: Vec<String>,
}

/// Parse `t=...,v1=...`; unknown schemes such as `v0` are skipped.
fn parse_signature_header(header: &str) -> Option<SignatureParts> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part.split_once('=')?;
        match key.trim() {
            "t" => timestamp = Some(value.trim().parse().ok()?),
            "v1" => signatures.push(value.trim().to_string()),
            _ => {}
        }
    }

    if signatures.is_empty() {
        return None;
    }

    Some(SignatureParts {
        timestamp: timestamp?,
        signatures,
    })
}

/// Constant-time comparison via `subtle`, resistant to compiler optimizations.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
