//! Persistence boundary for audit chains.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use uuid::Uuid;
use warden_types::{Hash, TenantId};

use crate::entry::AuditEntry;
use crate::error::StoreError;

/// Last entry of a tenant's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTail {
    pub sequence: u64,
    pub hash: Hash,
}

/// Storage for per-tenant audit chains.
///
/// Implementations must make [`append_if_tail`](AuditStore::append_if_tail)
/// atomic per tenant: the entry is written only if the tenant's current tail
/// hash equals `expected_prev` (or the chain is empty and `expected_prev` is
/// [`Hash::GENESIS`]). Entries are never updated except for the retired flag.
pub trait AuditStore: Send + Sync + 'static {
    fn tail(
        &self,
        tenant_id: &TenantId,
    ) -> impl Future<Output = Result<Option<ChainTail>, StoreError>> + Send;

    fn append_if_tail(
        &self,
        entry: AuditEntry,
        expected_prev: Hash,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Entries with `sequence` in `range`, in sequence order.
    fn read_range(
        &self,
        tenant_id: &TenantId,
        range: Range<u64>,
    ) -> impl Future<Output = Result<Vec<AuditEntry>, StoreError>> + Send;

    /// Flags entries as retired. Returns how many were newly flagged.
    fn mark_retired(
        &self,
        tenant_id: &TenantId,
        sequences: &[u64],
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// One tenant's entries plus an index of their event ids.
#[derive(Debug, Default)]
struct TenantChain {
    entries: Vec<AuditEntry>,
    ids: HashSet<Uuid>,
}

type Chain = Arc<Mutex<TenantChain>>;

/// In-process store. Each tenant chain has its own lock, so appends for
/// different tenants never contend.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    chains: RwLock<HashMap<TenantId, Chain>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self, tenant_id: &TenantId) -> Result<Option<Chain>, StoreError> {
        let chains = self
            .chains
            .read()
            .map_err(|_| StoreError::Unavailable("chain index lock poisoned".to_string()))?;
        Ok(chains.get(tenant_id).cloned())
    }

    fn chain_or_create(&self, tenant_id: &TenantId) -> Result<Chain, StoreError> {
        if let Some(chain) = self.chain(tenant_id)? {
            return Ok(chain);
        }
        let mut chains = self
            .chains
            .write()
            .map_err(|_| StoreError::Unavailable("chain index lock poisoned".to_string()))?;
        Ok(chains.entry(tenant_id.clone()).or_default().clone())
    }

    /// Applies `f` to a stored entry, bypassing the append-only contract.
    #[cfg(test)]
    pub(crate) fn tamper(
        &self,
        tenant_id: &TenantId,
        sequence: u64,
        f: impl FnOnce(&mut AuditEntry),
    ) {
        let chain = self.chain(tenant_id).unwrap().unwrap();
        let mut chain = chain.lock().unwrap();
        f(&mut chain.entries[sequence as usize]);
    }
}

fn lock(chain: &Chain) -> Result<MutexGuard<'_, TenantChain>, StoreError> {
    chain
        .lock()
        .map_err(|_| StoreError::Unavailable("chain lock poisoned".to_string()))
}

impl AuditStore for InMemoryAuditStore {
    async fn tail(&self, tenant_id: &TenantId) -> Result<Option<ChainTail>, StoreError> {
        let Some(chain) = self.chain(tenant_id)? else {
            return Ok(None);
        };
        let chain = lock(&chain)?;
        Ok(chain.entries.last().map(|entry| ChainTail {
            sequence: entry.sequence,
            hash: entry.current_hash,
        }))
    }

    async fn append_if_tail(
        &self,
        entry: AuditEntry,
        expected_prev: Hash,
    ) -> Result<(), StoreError> {
        let chain = self.chain_or_create(&entry.tenant_id)?;
        let mut chain = lock(&chain)?;

        let actual = chain
            .entries
            .last()
            .map_or(Hash::GENESIS, |last| last.current_hash);
        if actual != expected_prev {
            return Err(StoreError::Conflict {
                expected: expected_prev,
                actual,
            });
        }
        if chain.ids.contains(&entry.id) {
            return Err(StoreError::Duplicate(entry.id));
        }
        chain.ids.insert(entry.id);
        chain.entries.push(entry);
        Ok(())
    }

    async fn read_range(
        &self,
        tenant_id: &TenantId,
        range: Range<u64>,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let Some(chain) = self.chain(tenant_id)? else {
            return Ok(Vec::new());
        };
        let chain = lock(&chain)?;
        let len = chain.entries.len() as u64;
        let start = range.start.min(len) as usize;
        let end = range.end.min(len) as usize;
        Ok(chain.entries[start..end.max(start)].to_vec())
    }

    async fn mark_retired(
        &self,
        tenant_id: &TenantId,
        sequences: &[u64],
    ) -> Result<usize, StoreError> {
        let Some(chain) = self.chain(tenant_id)? else {
            return Ok(0);
        };
        let mut chain = lock(&chain)?;
        let mut flagged = 0;
        for &sequence in sequences {
            if let Some(entry) = chain.entries.get_mut(sequence as usize) {
                if !entry.retired {
                    entry.retired = true;
                    flagged += 1;
                }
            }
        }
        Ok(flagged)
    }
}
