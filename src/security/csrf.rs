//! Per-session anti-forgery tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use constant_time_eq::constant_time_eq;
use serde_json::Value;

use super::keys::random_bytes;
use super::session::Claims;

/// Claim under which the session's CSRF token is stored.
pub const CSRF_CLAIM: &str = "csrf_token";

/// Random bytes per token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Issues CSRF tokens and checks submitted ones against session claims.
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    claim: String,
}

impl Default for CsrfGuard {
    fn default() -> Self {
        Self {
            claim: CSRF_CLAIM.to_string(),
        }
    }
}

impl CsrfGuard {
    /// Guard storing its token under a custom claim name.
    pub fn with_claim(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
        }
    }

    /// Claim name used in session claims.
    pub fn claim(&self) -> &str {
        &self.claim
    }

    /// Produce a fresh token.
    pub fn issue_token(&self) -> String {
        URL_SAFE_NO_PAD.encode(random_bytes(TOKEN_BYTES))
    }

    /// Store a fresh token in `claims` and return it.
    pub fn attach(&self, claims: &mut Claims) -> String {
        let token = self.issue_token();
        claims.insert(self.claim.clone(), Value::String(token.clone()));
        token
    }

    /// Token stored in the session, if any.
    pub fn token_from<'a>(&self, claims: &'a Claims) -> Option<&'a str> {
        claims
            .get(&self.claim)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    /// Check a submitted token against the session's.
    ///
    /// Fails closed when the session carries no token.
    pub fn verify(&self, claims: &Claims, supplied: &str) -> bool {
        match self.token_from(claims) {
            Some(expected) => constant_time_eq(expected.as_bytes(), supplied.as_bytes()),
            None => false,
        }
    }
}
