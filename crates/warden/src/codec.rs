//! Field codec applied at the repository boundary.
//!
//! Protected fields are stored as [`Sealed<T>`]: an encryption envelope that
//! remembers the plaintext type. Encoding and decoding are explicit calls;
//! nothing is encrypted implicitly on save or load.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use warden_crypto::{EncryptionEnvelope, FieldCipher};
use warden_types::TenantId;

use crate::{Result, WardenError};

/// An encrypted value of type `T`.
///
/// Serializes exactly as its envelope, so persistence adapters store the
/// envelope fields unchanged.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sealed<T> {
    envelope: EncryptionEnvelope,
    #[serde(skip)]
    marker: PhantomData<fn() -> T>,
}

impl<T> Sealed<T> {
    /// Wraps an envelope read back from storage.
    pub fn from_envelope(envelope: EncryptionEnvelope) -> Self {
        Self {
            envelope,
            marker: PhantomData,
        }
    }

    pub fn envelope(&self) -> &EncryptionEnvelope {
        &self.envelope
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.envelope.tenant_id
    }

    pub fn into_envelope(self) -> EncryptionEnvelope {
        self.envelope
    }
}

impl<T> Clone for Sealed<T> {
    fn clone(&self) -> Self {
        Self::from_envelope(self.envelope.clone())
    }
}

impl<T> PartialEq for Sealed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.envelope == other.envelope
    }
}

impl<T> Eq for Sealed<T> {}

impl<T> fmt::Debug for Sealed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sealed")
            .field("tenant_id", &self.envelope.tenant_id)
            .field("version", &self.envelope.version)
            .field("created_at", &self.envelope.created_at)
            .finish_non_exhaustive()
    }
}

/// Encodes typed values into tenant-bound envelopes and back.
#[derive(Debug, Clone)]
pub struct FieldCodec {
    cipher: Arc<FieldCipher>,
}

impl FieldCodec {
    pub fn new(cipher: FieldCipher) -> Self {
        Self {
            cipher: Arc::new(cipher),
        }
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    /// Serializes `value` to JSON and encrypts it under the tenant key.
    pub fn encode<T: Serialize>(&self, value: &T, tenant_id: &TenantId) -> Result<Sealed<T>> {
        let plaintext = serde_json::to_vec(value)
            .map_err(|e| WardenError::Validation(format!("cannot encode field: {e}")))?;
        let envelope = self.cipher.encrypt(&plaintext, tenant_id)?;
        Ok(Sealed::from_envelope(envelope))
    }

    /// Decrypts on behalf of `tenant_id` and deserializes.
    ///
    /// A foreign envelope fails with an authorization error before any
    /// cryptographic work; a tampered one fails with an integrity error.
    pub fn decode<T: DeserializeOwned>(
        &self,
        sealed: &Sealed<T>,
        tenant_id: &TenantId,
    ) -> Result<T> {
        let plaintext = self.cipher.decrypt(&sealed.envelope, tenant_id)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| WardenError::Integrity(format!("decrypted field does not decode: {e}")))
    }

    /// Replaces the envelope wholesale with a fresh nonce and tag.
    pub fn reencode<T>(&self, sealed: &Sealed<T>, tenant_id: &TenantId) -> Result<Sealed<T>> {
        let envelope = self.cipher.reseal(&sealed.envelope, tenant_id)?;
        Ok(Sealed::from_envelope(envelope))
    }
}
