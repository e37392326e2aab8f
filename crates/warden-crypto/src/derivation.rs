//! Per-tenant key derivation.
//!
//! ```text
//! salt = SHA-256(tenant_id)
//! prk  = HMAC-SHA-256(key = salt, msg = master_key)
//! key  = HMAC-SHA-256(key = prk,  msg = "tenant:" || tenant_id)
//! ```
//!
//! This is the extract/expand shape of HKDF with a single 32-byte output
//! block. Keys are deterministic, so nothing per-tenant has to be stored.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use warden_types::TenantId;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::chain::sha256;
use crate::error::{CryptoError, Result};
use crate::master_key::{MASTER_KEY_LENGTH, MasterKey};

type HmacSha256 = Hmac<Sha256>;

const INFO_PREFIX: &[u8] = b"tenant:";

/// A 256-bit tenant data key. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TenantKey([u8; 32]);

impl TenantKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TenantKey(<redacted>)")
    }
}

/// Derives tenant keys from the master key.
#[derive(Debug, Clone)]
pub struct KeyDerivationService {
    master: MasterKey,
}

impl KeyDerivationService {
    pub fn new(master: MasterKey) -> Self {
        Self { master }
    }

    /// Derives the key for an already validated tenant.
    pub fn derive(&self, tenant_id: &TenantId) -> Result<TenantKey> {
        derive_key(self.master.as_bytes(), tenant_id.as_str())
    }

    /// Derives a tenant key from raw inputs.
    ///
    /// Fails with [`CryptoError::Configuration`] when the master key is not
    /// exactly 32 bytes or the tenant id is not a well-formed identifier.
    pub fn derive_tenant_key(tenant_id: &str, master_key: &[u8]) -> Result<TenantKey> {
        if master_key.len() != MASTER_KEY_LENGTH {
            return Err(CryptoError::Configuration(format!(
                "master key must be exactly {MASTER_KEY_LENGTH} bytes, got {}",
                master_key.len()
            )));
        }
        let tenant = TenantId::parse(tenant_id)
            .map_err(|e| CryptoError::Configuration(format!("invalid tenant id: {e}")))?;
        derive_key(master_key, tenant.as_str())
    }
}

fn derive_key(master_key: &[u8], tenant_id: &str) -> Result<TenantKey> {
    let salt = sha256(tenant_id.as_bytes());

    let mut extract = new_mac(&salt)?;
    extract.update(master_key);
    let mut prk: [u8; 32] = extract.finalize().into_bytes().into();

    let mut expand = new_mac(&prk)?;
    prk.zeroize();
    expand.update(INFO_PREFIX);
    expand.update(tenant_id.as_bytes());
    let key: [u8; 32] = expand.finalize().into_bytes().into();

    Ok(TenantKey(key))
}

fn new_mac(key: &[u8]) -> Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| CryptoError::Configuration(format!("hmac key rejected: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MASTER: [u8; 32] = [0x42; 32];

    #[test]
    fn derivation_is_deterministic() {
        let a = KeyDerivationService::derive_tenant_key("acme", &MASTER).unwrap();
        let b = KeyDerivationService::derive_tenant_key("acme", &MASTER).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn tenants_get_distinct_keys() {
        let a = KeyDerivationService::derive_tenant_key("acme", &MASTER).unwrap();
        let b = KeyDerivationService::derive_tenant_key("globex", &MASTER).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn master_key_changes_every_tenant_key() {
        let a = KeyDerivationService::derive_tenant_key("acme", &MASTER).unwrap();
        let b = KeyDerivationService::derive_tenant_key("acme", &[0x43; 32]).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn matches_manual_construction() {
        let salt = sha256(b"acme");
        let mut mac = HmacSha256::new_from_slice(&salt).unwrap();
        mac.update(&MASTER);
        let prk: [u8; 32] = mac.finalize().into_bytes().into();
        let mut mac = HmacSha256::new_from_slice(&prk).unwrap();
        mac.update(b"tenant:acme");
        let expected: [u8; 32] = mac.finalize().into_bytes().into();

        let key = KeyDerivationService::derive_tenant_key("acme", &MASTER).unwrap();
        assert_eq!(key.as_bytes(), &expected);
    }

    #[test]
    fn rejects_short_master_key() {
        let err = KeyDerivationService::derive_tenant_key("acme", &[1u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::Configuration(_)));
    }

    #[test]
    fn rejects_malformed_tenant() {
        let err = KeyDerivationService::derive_tenant_key("acme/../root", &MASTER).unwrap_err();
        assert!(matches!(err, CryptoError::Configuration(_)));
    }

    #[test]
    fn service_agrees_with_raw_derivation() {
        let service = KeyDerivationService::new(MasterKey::from_slice(&MASTER).unwrap());
        let tenant = TenantId::parse("acme").unwrap();
        let via_service = service.derive(&tenant).unwrap();
        let via_raw = KeyDerivationService::derive_tenant_key("acme", &MASTER).unwrap();
        assert_eq!(via_service.as_bytes(), via_raw.as_bytes());
    }

    proptest! {
        #[test]
        fn distinct_tenants_never_collide(
            a in "[a-z0-9][a-z0-9_-]{0,20}",
            b in "[a-z0-9][a-z0-9_-]{0,20}",
        ) {
            prop_assume!(a != b);
            let ka = KeyDerivationService::derive_tenant_key(&a, &MASTER).unwrap();
            let kb = KeyDerivationService::derive_tenant_key(&b, &MASTER).unwrap();
            prop_assert_ne!(ka.as_bytes(), kb.as_bytes());
        }
    }
}
