//! Error types for the Warden facade.

use std::time::Duration;

use thiserror::Error;
use warden_ability::{AbilityError, rules::TENANT_BOUNDARY};
use warden_audit::{LedgerError, StoreError};
use warden_compliance::{ComplianceError, ComplianceFinding};
use warden_config::ConfigError;
use warden_crypto::CryptoError;
use warden_risk::RiskError;

use crate::repository::RepositoryError;

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, WardenError>;

/// Errors surfaced to callers of [`crate::Warden`].
///
/// Authorization errors carry only the matched rule id and a generic reason;
/// never the resource contents or the failing attribute values.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Unusable configuration or key material. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("access denied by rule '{matched_rule}': {reason}")]
    Authorization { matched_rule: String, reason: String },

    /// Stored data failed authentication.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Raised only when a caller asks to enforce a compliance result.
    #[error("compliance violation: {} finding(s), score {score}", findings.len())]
    ComplianceViolation {
        score: u32,
        findings: Vec<ComplianceFinding>,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl WardenError {
    pub fn is_authorization(&self) -> bool {
        matches!(self, WardenError::Authorization { .. })
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, WardenError::Integrity(_))
    }
}

impl From<CryptoError> for WardenError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Configuration(msg) => WardenError::Configuration(msg),
            CryptoError::TenantMismatch { .. } => WardenError::Authorization {
                matched_rule: TENANT_BOUNDARY.to_string(),
                reason: "resource belongs to another tenant".to_string(),
            },
            CryptoError::Integrity(msg) => WardenError::Integrity(msg),
            CryptoError::Encryption(msg) => {
                WardenError::Storage(format!("encryption failed: {msg}"))
            }
        }
    }
}

impl From<AbilityError> for WardenError {
    fn from(err: AbilityError) -> Self {
        match err {
            AbilityError::Denied {
                matched_rule,
                reason,
            } => WardenError::Authorization {
                matched_rule,
                reason,
            },
        }
    }
}

impl From<LedgerError> for WardenError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Timeout(after) => WardenError::Timeout(after),
            LedgerError::Crypto(e) => e.into(),
            LedgerError::Store(StoreError::Unavailable(msg)) => WardenError::Storage(msg),
            other => WardenError::Storage(other.to_string()),
        }
    }
}

impl From<ComplianceError> for WardenError {
    fn from(err: ComplianceError) -> Self {
        match err {
            ComplianceError::Violation { score, findings } => {
                WardenError::ComplianceViolation { score, findings }
            }
            other => WardenError::Validation(other.to_string()),
        }
    }
}

impl From<RiskError> for WardenError {
    fn from(err: RiskError) -> Self {
        WardenError::Validation(err.to_string())
    }
}

impl From<ConfigError> for WardenError {
    fn from(err: ConfigError) -> Self {
        WardenError::Configuration(err.to_string())
    }
}

impl From<RepositoryError> for WardenError {
    fn from(err: RepositoryError) -> Self {
        WardenError::Storage(err.to_string())
    }
}
