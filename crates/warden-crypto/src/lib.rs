//! # warden-crypto: tenant-scoped cryptography for `Warden`
//!
//! - [`KeyDerivationService`]: deterministic per-tenant keys from one master key
//! - [`FieldCipher`]: AES-256-GCM field encryption producing [`EncryptionEnvelope`]s
//! - [`MasterKey`] and [`MasterKeyProvider`]: validated master key input
//! - [`chain_hash`]: SHA-256 link function for the audit chain
//!
//! Every envelope is bound to its tenant through the AEAD associated data, so
//! a ciphertext moved to another tenant's row fails authentication even if the
//! tenant check were bypassed.

mod chain;
mod cipher;
mod derivation;
mod error;
mod master_key;

pub use chain::{chain_hash, hashes_match, sha256};
pub use cipher::{ENVELOPE_VERSION, EncryptionAlgorithm, EncryptionEnvelope, FieldCipher};
pub use derivation::{KeyDerivationService, TenantKey};
pub use error::{CryptoError, Result};
pub use master_key::{
    EnvMasterKeyProvider, FileMasterKeyProvider, MASTER_KEY_LENGTH, MasterKey, MasterKeyProvider,
};
