//! Tenant-bound AES-256-GCM field encryption.
//!
//! Each call to [`FieldCipher::encrypt`] uses a fresh random 96-bit nonce.
//! Random nonces are safe up to roughly 2^32 encryptions under one tenant key
//! (the GCM birthday bound); past that the tenant key must be rotated.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use warden_types::TenantId;
use zeroize::Zeroizing;

use crate::derivation::KeyDerivationService;
use crate::error::{CryptoError, Result};

/// Envelope format version written by this crate.
pub const ENVELOPE_VERSION: u16 = 1;

const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// AEAD algorithm recorded in an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

/// An encrypted field value.
///
/// Envelopes are never patched in place: an update writes a brand new
/// envelope with a new nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionEnvelope {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    pub iv: [u8; NONCE_LENGTH],
    #[serde(with = "b64")]
    pub auth_tag: [u8; TAG_LENGTH],
    pub tenant_id: TenantId,
    pub algorithm: EncryptionAlgorithm,
    pub version: u16,
    pub created_at: DateTime<Utc>,
}

/// Encrypts and decrypts field values under per-tenant keys.
#[derive(Debug, Clone)]
pub struct FieldCipher {
    keys: KeyDerivationService,
}

impl FieldCipher {
    pub fn new(keys: KeyDerivationService) -> Self {
        Self { keys }
    }

    /// Encrypts `plaintext` for `tenant_id`, binding the tenant as associated data.
    pub fn encrypt(&self, plaintext: &[u8], tenant_id: &TenantId) -> Result<EncryptionEnvelope> {
        let key = self.keys.derive(tenant_id)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut iv = [0u8; NONCE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let mut sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: tenant_id.as_bytes(),
                },
            )
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let tag_bytes = sealed.split_off(sealed.len() - TAG_LENGTH);
        let auth_tag: [u8; TAG_LENGTH] = tag_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::Encryption("unexpected tag length".to_string()))?;

        Ok(EncryptionEnvelope {
            ciphertext: sealed,
            iv,
            auth_tag,
            tenant_id: tenant_id.clone(),
            algorithm: EncryptionAlgorithm::Aes256Gcm,
            version: ENVELOPE_VERSION,
            created_at: Utc::now(),
        })
    }

    /// Decrypts an envelope on behalf of `expected_tenant`.
    ///
    /// The tenant check happens before any key derivation or tag
    /// verification, so a cross-tenant read is always reported as
    /// [`CryptoError::TenantMismatch`] and never as an integrity failure.
    pub fn decrypt(
        &self,
        envelope: &EncryptionEnvelope,
        expected_tenant: &TenantId,
    ) -> Result<Zeroizing<Vec<u8>>> {
        if &envelope.tenant_id != expected_tenant {
            return Err(CryptoError::TenantMismatch {
                expected: expected_tenant.clone(),
            });
        }
        if envelope.version != ENVELOPE_VERSION {
            return Err(CryptoError::Integrity(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }

        let key = self.keys.derive(expected_tenant)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(envelope.ciphertext.len() + TAG_LENGTH);
        sealed.extend_from_slice(&envelope.ciphertext);
        sealed.extend_from_slice(&envelope.auth_tag);

        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&envelope.iv),
                Payload {
                    msg: &sealed,
                    aad: expected_tenant.as_bytes(),
                },
            )
            .map_err(|_| {
                CryptoError::Integrity("authentication tag verification failed".to_string())
            })?;

        Ok(Zeroizing::new(plaintext))
    }

    /// Re-encrypts an envelope's plaintext under a fresh nonce.
    pub fn reseal(
        &self,
        envelope: &EncryptionEnvelope,
        tenant_id: &TenantId,
    ) -> Result<EncryptionEnvelope> {
        let plaintext = self.decrypt(envelope, tenant_id)?;
        self.encrypt(&plaintext, tenant_id)
    }
}

/// Base64 (standard alphabet) encoding for envelope byte fields.
mod b64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let text = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(text).map_err(D::Error::custom)?;
        let len = bytes.len();
        T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected byte length {len}")))
    }
}
