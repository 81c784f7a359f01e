//! Server-held secrets: the session signing key and generated shared secrets.
//!
//! Secrets are either supplied by configuration or generated once with the
//! OS RNG and persisted, so that restarting the process keeps outstanding
//! session tokens valid.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::RemoError;

/// Minimum signing key length in bytes.
pub const MIN_KEY_LEN: usize = 32;

/// Key used to sign session tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(random_bytes(MIN_KEY_LEN))
    }

    /// Parse a hex-encoded key.
    pub fn from_hex(hex_key: &str) -> Result<Self, RemoError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| RemoError::InvalidSigningKey(format!("not valid hex: {}", e)))?;
        Self::from_bytes(bytes)
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RemoError> {
        if bytes.len() < MIN_KEY_LEN {
            return Err(RemoError::InvalidSigningKey(format!(
                "key must be at least {} bytes, got {}",
                MIN_KEY_LEN,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Load the key stored at `path`, generating and persisting one if the
    /// file does not exist yet.
    pub fn load_or_generate(path: &Path) -> Result<Self, RemoError> {
        let hex_key = load_or_create_secret(path)?;
        Self::from_hex(&hex_key)
    }

    /// Hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningKey").field(&"<redacted>").finish()
    }
}

/// Read a hex secret from `path`, or generate one and write it there.
pub fn load_or_create_secret(path: &Path) -> io::Result<String> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let secret = contents.trim().to_string();
            if secret.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("secret file {} is empty", path.display()),
                ));
            }
            Ok(secret)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let secret = hex::encode(random_bytes(MIN_KEY_LEN));
            write_private(path, &secret)?;
            tracing::info!("Generated new secret at {}", path.display());
            Ok(secret)
        }
        Err(e) => Err(e),
    }
}

/// Fill a buffer from the OS RNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn write_private(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}
