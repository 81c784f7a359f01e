//! Dashboard credential validation.

use std::fmt;
use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use constant_time_eq::constant_time_eq_32;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::RemoError;

/// Prefix of argon2 PHC strings.
const ARGON2_PREFIX: &str = "$argon2";

/// Reference secret the dashboard accepts.
enum ReferenceSecret {
    /// Digest of a plaintext secret from configuration.
    Plain([u8; 32]),
    /// Argon2 PHC string.
    Hashed(String),
}

/// Checks a username/secret pair against the single configured pair.
///
/// Both fields are reduced to fixed-size digests before comparison so that
/// neither the position of the first differing byte nor the length of the
/// input influences timing. Both comparisons always run.
pub struct CredentialValidator {
    identity: [u8; 32],
    secret: ReferenceSecret,
}

impl CredentialValidator {
    /// Create a validator for the configured pair.
    ///
    /// A `secret` that looks like an argon2 PHC string is verified as a hash;
    /// anything else is treated as plaintext.
    pub fn new(identity: &str, secret: &str) -> Self {
        let secret = if secret.starts_with(ARGON2_PREFIX) {
            ReferenceSecret::Hashed(secret.to_string())
        } else {
            ReferenceSecret::Plain(digest(secret))
        };
        Self {
            identity: digest(identity),
            secret,
        }
    }

    /// Whether the reference secret is stored as a hash.
    pub fn is_hashed(&self) -> bool {
        matches!(self.secret, ReferenceSecret::Hashed(_))
    }

    /// Validate a submitted pair.
    pub fn validate_credentials(&self, identity: &str, secret: &str) -> bool {
        let identity_ok = constant_time_eq_32(&digest(identity), &self.identity);
        let secret_ok = match &self.secret {
            ReferenceSecret::Plain(expected) => constant_time_eq_32(&digest(secret), expected),
            ReferenceSecret::Hashed(hash) => verify_hash(secret, hash),
        };
        // Both checks always run.
        identity_ok & secret_ok
    }
}

impl fmt::Debug for CredentialValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialValidator")
            .field("hashed", &self.is_hashed())
            .finish_non_exhaustive()
    }
}

/// Validate credentials on the blocking pool.
///
/// Argon2 verification is CPU-bound; running it here keeps the async
/// workers free to admit other requests. A panicked task counts as a
/// failed validation.
pub async fn validate_credentials_blocking(
    validator: Arc<CredentialValidator>,
    identity: String,
    secret: String,
) -> bool {
    match tokio::task::spawn_blocking(move || validator.validate_credentials(&identity, &secret))
        .await
    {
        Ok(valid) => valid,
        Err(e) => {
            tracing::error!("credential validation task failed: {}", e);
            false
        }
    }
}

/// Hash a secret with argon2id and a random embedded salt.
pub fn hash_secret(secret: &str) -> Result<String, RemoError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RemoError::PasswordHash(e.to_string()))
}

/// Verify a secret against a PHC hash string.
///
/// Malformed hashes and algorithm mismatches return `false`.
pub fn verify_hash(secret: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

fn digest(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}
