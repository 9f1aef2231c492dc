use crate::errors::ServiceError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `Stripe-Signature` style headers: `t=<unix ts>,v1=<hex hmac>[,v1=...]`.
///
/// The signed payload is `"{t}.{raw body}"`, keyed with the shared webhook secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), ServiceError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), ServiceError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| ServiceError::InvalidSignature("missing timestamp".to_string()))?;
        if candidates.is_empty() {
            return Err(ServiceError::InvalidSignature(
                "missing v1 signature".to_string(),
            ));
        }

        let issued_at: i64 = timestamp
            .parse()
            .map_err(|_| ServiceError::InvalidSignature("malformed timestamp".to_string()))?;
        if now.abs_diff(issued_at) > self.tolerance_secs.unsigned_abs() {
            return Err(ServiceError::InvalidSignature(
                "timestamp outside tolerance".to_string(),
            ));
        }

        let mac = self.mac_for(timestamp, payload)?;
        let matched = candidates.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(ServiceError::InvalidSignature(
                "no signature matches the payload".to_string(),
            ))
        }
    }

    /// Builds a header the way the provider does. Used by tests and local tooling.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, ServiceError> {
        let ts = timestamp.to_string();
        let signature = hex::encode(self.mac_for(&ts, payload)?.finalize().into_bytes());
        Ok(format!("t={},v1={}", ts, signature))
    }

    fn mac_for(&self, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, ServiceError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("HMAC key rejected: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}
