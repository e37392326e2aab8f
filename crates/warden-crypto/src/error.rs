use thiserror::Error;
use warden_types::TenantId;

/// Errors raised by key handling and field encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material or identifiers are unusable. Fatal at startup.
    #[error("crypto configuration error: {0}")]
    Configuration(String),

    /// An envelope was presented for a tenant other than its owner.
    #[error("envelope belongs to another tenant (expected {expected})")]
    TenantMismatch { expected: TenantId },

    /// Authentication failed or the envelope is malformed.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("encryption failed: {0}")]
    Encryption(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
