//! Signed, self-contained, expiring session tokens.
//!
//! A token is `base64url(payload) "." base64url(hmac_sha256(base64url(payload)))`
//! where the payload is the JSON object `{"claims": {...}, "issued_at": <unix ms>}`.
//! Nothing is stored server-side; a token is valid iff its signature checks
//! out under the server key and it has not outlived the session timeout.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use super::keys::SigningKey;
use crate::error::RemoError;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a session.
pub type Claims = serde_json::Map<String, Value>;

/// Why a token was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Token is not structurally a session token.
    #[error("malformed session token")]
    Malformed,
    /// Signature does not match the payload.
    #[error("bad session signature")]
    BadSignature,
    /// Session outlived its timeout.
    #[error("session expired")]
    Expired,
    /// Claims could not be serialized.
    #[error("failed to encode session: {0}")]
    Encode(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    claims: Claims,
    issued_at: u64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
    timeout: Duration,
}

impl SessionCodec {
    /// Create a codec signing with `key`; tokens die after `timeout`.
    pub fn new(key: &SigningKey, timeout: Duration) -> Result<Self, RemoError> {
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| RemoError::InvalidSigningKey(e.to_string()))?;
        Ok(Self { mac, timeout })
    }

    /// Session lifetime.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue a token for `claims`, stamped with the current time.
    pub fn issue(&self, claims: Claims) -> Result<String, SessionError> {
        self.issue_at(claims, SystemTime::now())
    }

    /// Issue a token stamped with `now`.
    pub fn issue_at(&self, claims: Claims, now: SystemTime) -> Result<String, SessionError> {
        let payload = SessionPayload {
            claims,
            issued_at: unix_millis(now),
        };
        let json = serde_json::to_vec(&payload).map_err(|e| SessionError::Encode(e.to_string()))?;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let signature = self.sign(&encoded);
        Ok(format!("{}.{}", encoded, signature))
    }

    /// Verify a token at the current time and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        self.verify_at(token, SystemTime::now())
    }

    /// Verify a token as of `now`.
    ///
    /// Tokens stamped in the future are accepted; only age is bounded.
    pub fn verify_at(&self, token: &str, now: SystemTime) -> Result<Claims, SessionError> {
        let (encoded, signature) = token.split_once('.').ok_or(SessionError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SessionError::Malformed)?;
        let payload: SessionPayload =
            serde_json::from_slice(&json).map_err(|_| SessionError::Malformed)?;

        let age = unix_millis(now).saturating_sub(payload.issued_at);
        if u128::from(age) > self.timeout.as_millis() {
            return Err(SessionError::Expired);
        }

        Ok(payload.claims)
    }

    fn sign(&self, encoded: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(encoded.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn unix_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
