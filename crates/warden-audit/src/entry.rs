//! Audit events and chained entries.
//!
//! An [`AuditEvent`] is what callers record. The ledger turns it into an
//! [`AuditEntry`] by assigning the next sequence number and linking it to the
//! tenant's previous entry:
//!
//! ```text
//! current_hash = SHA-256(canonical(event fields) || prev_hash)
//! ```
//!
//! The canonical form is the postcard encoding of `HashedFields`. The
//! `retired` flag is not hashed: retiring an entry leaves the chain intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_crypto::{EncryptionEnvelope, FieldCipher, chain_hash};
use warden_types::{Hash, PrincipalId, ResourceRef, TenantId};

use crate::error::{LedgerError, Result};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    AccessGranted,
    AccessDenied,
    RecordCreated,
    RecordUpdated,
    RecordDeleted,
    FieldDecrypted,
    ComplianceEvaluated,
    RiskScored,
    AssessmentStatusChanged,
    IntegrityViolation,
    EntriesRetired,
}

/// Event details. Sensitive details are sealed under the tenant key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditPayload {
    Empty,
    Plain(serde_json::Value),
    Sealed(EncryptionEnvelope),
}

impl AuditPayload {
    /// Encrypts a JSON value for `tenant_id`.
    pub fn seal(
        cipher: &FieldCipher,
        tenant_id: &TenantId,
        value: &serde_json::Value,
    ) -> Result<Self> {
        let bytes = serde_json::to_vec(value).map_err(|e| LedgerError::Encoding(e.to_string()))?;
        Ok(AuditPayload::Sealed(cipher.encrypt(&bytes, tenant_id)?))
    }

    /// Returns the payload as JSON, decrypting sealed payloads.
    pub fn open(&self, cipher: &FieldCipher, tenant_id: &TenantId) -> Result<serde_json::Value> {
        match self {
            AuditPayload::Empty => Ok(serde_json::Value::Null),
            AuditPayload::Plain(value) => Ok(value.clone()),
            AuditPayload::Sealed(envelope) => {
                let bytes = cipher.decrypt(envelope, tenant_id)?;
                serde_json::from_slice(&bytes).map_err(|e| LedgerError::Encoding(e.to_string()))
            }
        }
    }
}

/// An event to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Stable across retries, so a retried append can be recognised.
    pub id: Uuid,
    pub actor_id: PrincipalId,
    pub action: AuditAction,
    pub resource: Option<ResourceRef>,
    pub occurred_at: DateTime<Utc>,
    pub payload: AuditPayload,
}

impl AuditEvent {
    pub fn new(actor_id: impl Into<PrincipalId>, action: AuditAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: actor_id.into(),
            action,
            resource: None,
            occurred_at: Utc::now(),
            payload: AuditPayload::Empty,
        }
    }

    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_payload(mut self, payload: AuditPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.payload = AuditPayload::Plain(details);
        self
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// A persisted, chained audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tenant_id: TenantId,
    /// Position in the tenant's chain, starting at 0.
    pub sequence: u64,
    pub actor_id: PrincipalId,
    pub action: AuditAction,
    pub resource: Option<ResourceRef>,
    pub timestamp: DateTime<Utc>,
    pub payload: AuditPayload,
    pub prev_hash: Hash,
    pub current_hash: Hash,
    pub retired: bool,
}

#[derive(Serialize)]
struct HashedFields<'a> {
    id: &'a Uuid,
    tenant_id: &'a TenantId,
    sequence: u64,
    actor_id: &'a PrincipalId,
    action: AuditAction,
    resource: Option<&'a ResourceRef>,
    timestamp: &'a DateTime<Utc>,
    payload: &'a AuditPayload,
}

impl AuditEntry {
    /// Builds the entry at `sequence` that follows `prev_hash`.
    pub fn link(
        event: &AuditEvent,
        tenant_id: &TenantId,
        sequence: u64,
        prev_hash: Hash,
    ) -> Result<Self> {
        let mut entry = Self {
            id: event.id,
            tenant_id: tenant_id.clone(),
            sequence,
            actor_id: event.actor_id.clone(),
            action: event.action,
            resource: event.resource.clone(),
            timestamp: event.occurred_at,
            payload: event.payload.clone(),
            prev_hash,
            current_hash: Hash::GENESIS,
            retired: false,
        };
        entry.current_hash = entry.compute_hash()?;
        Ok(entry)
    }

    /// Recomputes the chain hash from this entry's content and `prev_hash`.
    pub fn compute_hash(&self) -> Result<Hash> {
        let canonical = postcard::to_allocvec(&HashedFields {
            id: &self.id,
            tenant_id: &self.tenant_id,
            sequence: self.sequence,
            actor_id: &self.actor_id,
            action: self.action,
            resource: self.resource.as_ref(),
            timestamp: &self.timestamp,
            payload: &self.payload,
        })
        .map_err(|e| LedgerError::Encoding(e.to_string()))?;
        Ok(chain_hash(&self.prev_hash, &canonical))
    }

    /// Rebuilds the event this entry was recorded from.
    pub fn to_event(&self) -> AuditEvent {
        AuditEvent {
            id: self.id,
            actor_id: self.actor_id.clone(),
            action: self.action,
            resource: self.resource.clone(),
            occurred_at: self.timestamp,
            payload: self.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_crypto::{KeyDerivationService, MasterKey};
    use warden_types::ResourceType;

    fn tenant() -> TenantId {
        TenantId::parse("acme").unwrap()
    }

    #[test]
    fn link_is_deterministic_for_same_event() {
        let event =
            AuditEvent::new("alice", AuditAction::RecordCreated).with_details(json!({"k": 1}));
        let a = AuditEntry::link(&event, &tenant(), 0, Hash::GENESIS).unwrap();
        let b = AuditEntry::link(&event, &tenant(), 0, Hash::GENESIS).unwrap();
        assert_eq!(a.current_hash, b.current_hash);
        assert_eq!(a.compute_hash().unwrap(), a.current_hash);
    }

    #[test]
    fn hash_covers_content_and_link() {
        let event = AuditEvent::new("alice", AuditAction::AccessGranted).with_resource(
            ResourceRef::new(tenant(), ResourceType::Document, "doc-1"),
        );
        let base = AuditEntry::link(&event, &tenant(), 3, Hash::GENESIS).unwrap();

        let mut other = base.clone();
        other.sequence = 4;
        assert_ne!(other.compute_hash().unwrap(), base.current_hash);

        let mut other = base.clone();
        other.prev_hash = Hash::from_bytes([1u8; 32]);
        assert_ne!(other.compute_hash().unwrap(), base.current_hash);

        let mut other = base.clone();
        other.actor_id = PrincipalId::from("mallory");
        assert_ne!(other.compute_hash().unwrap(), base.current_hash);
    }

    #[test]
    fn retired_flag_is_outside_the_hash() {
        let event = AuditEvent::new("alice", AuditAction::RecordDeleted);
        let mut entry = AuditEntry::link(&event, &tenant(), 0, Hash::GENESIS).unwrap();
        entry.retired = true;
        assert_eq!(entry.compute_hash().unwrap(), entry.current_hash);
    }

    #[test]
    fn sealed_payload_roundtrip() {
        let cipher = FieldCipher::new(KeyDerivationService::new(
            MasterKey::from_slice(&[8u8; 32]).unwrap(),
        ));
        let details = json!({"ssn_last4": "6789"});
        let payload = AuditPayload::seal(&cipher, &tenant(), &details).unwrap();
        assert!(matches!(payload, AuditPayload::Sealed(_)));
        assert_eq!(payload.open(&cipher, &tenant()).unwrap(), details);

        let other = TenantId::parse("globex").unwrap();
        assert!(payload.open(&cipher, &other).is_err());
    }

    #[test]
    fn entry_converts_back_to_event() {
        let event =
            AuditEvent::new("bob", AuditAction::RiskScored).with_details(json!({"score": 42}));
        let entry = AuditEntry::link(&event, &tenant(), 7, Hash::GENESIS).unwrap();
        assert_eq!(entry.to_event(), event);
    }
}
