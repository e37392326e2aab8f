//! Audit ledger errors.

use thiserror::Error;
use uuid::Uuid;
use warden_crypto::CryptoError;
use warden_types::{Hash, TenantId};

/// Errors reported by an [`AuditStore`](crate::AuditStore) implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The chain tail moved since it was read.
    #[error("chain tail changed: expected {expected}, found {actual}")]
    Conflict { expected: Hash, actual: Hash },

    /// An entry with this event id is already in the chain.
    #[error("audit event {0} already recorded")]
    Duplicate(Uuid),

    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("audit store did not respond within {0:?}")]
    Timeout(std::time::Duration),

    #[error("gave up appending for tenant {tenant_id} after {attempts} tail conflicts")]
    ContentionExhausted { tenant_id: TenantId, attempts: u32 },

    #[error("failed to encode audit entry: {0}")]
    Encoding(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl LedgerError {
    /// True when a later retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Timeout(_)
                | LedgerError::ContentionExhausted { .. }
                | LedgerError::Store(StoreError::Unavailable(_) | StoreError::Conflict { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
