//! Master key input.
//!
//! The master key is the only long-lived secret. It is supplied by an
//! external custodian (environment variable or mounted file) and never
//! generated implicitly: a missing key is a startup failure.

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, Result};

/// Required master key length in bytes.
pub const MASTER_KEY_LENGTH: usize = 32;

/// A validated 256-bit master key. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_LENGTH]);

impl MasterKey {
    /// Builds a master key from raw bytes, rejecting anything but exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; MASTER_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            CryptoError::Configuration(format!(
                "master key must be exactly {MASTER_KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        if key == [0u8; MASTER_KEY_LENGTH] {
            return Err(CryptoError::Configuration(
                "master key is all zeros".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// Decodes a base64 (standard alphabet) master key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|e| {
            CryptoError::Configuration(format!("master key is not valid base64: {e}"))
        })?);
        Self::from_slice(&decoded)
    }

    /// Generates a fresh random key from the OS RNG.
    ///
    /// Provisioning tools and tests only; services load their key through a
    /// [`MasterKeyProvider`].
    pub fn generate() -> Self {
        let mut key = [0u8; MASTER_KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(&self.0))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; MASTER_KEY_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Source of the master key.
pub trait MasterKeyProvider {
    fn load(&self) -> Result<MasterKey>;
}

/// Reads a base64 master key from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvMasterKeyProvider {
    variable: String,
}

impl EnvMasterKeyProvider {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl MasterKeyProvider for EnvMasterKeyProvider {
    fn load(&self) -> Result<MasterKey> {
        let value = Zeroizing::new(std::env::var(&self.variable).map_err(|_| {
            CryptoError::Configuration(format!(
                "master key variable {} is not set",
                self.variable
            ))
        })?);
        MasterKey::from_base64(&value)
    }
}

/// Reads the master key from a file holding either 32 raw bytes or base64 text.
#[derive(Debug, Clone)]
pub struct FileMasterKeyProvider {
    path: PathBuf,
}

impl FileMasterKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MasterKeyProvider for FileMasterKeyProvider {
    fn load(&self) -> Result<MasterKey> {
        let contents = Zeroizing::new(std::fs::read(&self.path).map_err(|e| {
            CryptoError::Configuration(format!(
                "cannot read master key file {}: {e}",
                self.path.display()
            ))
        })?);
        if contents.len() == MASTER_KEY_LENGTH {
            return MasterKey::from_slice(&contents);
        }
        let text = std::str::from_utf8(&contents).map_err(|_| {
            CryptoError::Configuration(format!(
                "master key file {} is neither 32 raw bytes nor base64 text",
                self.path.display()
            ))
        })?;
        MasterKey::from_base64(text)
    }
}
