//! The tenant-scoped audit ledger.
//!
//! Appends are serialized per tenant by compare-and-append against the tail
//! hash the appender read. When two writers race, the loser re-reads the
//! tail and relinks its entry, so the chain stays linear without a global
//! lock.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use warden_config::AuditConfig;
use warden_crypto::hashes_match;
use warden_types::{Hash, PrincipalId, TenantId};

use crate::alert::{AlertSink, SecurityAlert};
use crate::entry::{AuditAction, AuditEntry, AuditEvent};
use crate::error::{LedgerError, Result, StoreError};
use crate::retry::{PendingAppend, RetryPolicy, RetryWorker};
use crate::store::AuditStore;

/// Principal recorded on entries the ledger writes itself.
pub const RETENTION_ACTOR: &str = "system:retention";

/// Ledger tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    /// Tail conflicts tolerated by one append before giving up.
    pub max_contention_retries: u32,
    pub retry: RetryPolicy,
    pub retry_queue_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::from(&AuditConfig::default())
    }
}

impl From<&AuditConfig> for LedgerConfig {
    fn from(audit: &AuditConfig) -> Self {
        Self {
            store_timeout: audit.store_timeout(),
            max_contention_retries: audit.max_contention_retries,
            retry: RetryPolicy::from(audit),
            retry_queue_capacity: audit.retry_queue_capacity,
        }
    }
}

/// Result of the best-effort [`AuditLedger::record`] path.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Appended(AuditEntry),
    /// The append failed and the event is waiting in the retry queue.
    Queued,
    /// The retry queue was unavailable; an alert carrying the event was raised.
    Escalated,
}

/// Why a chain failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakReason {
    /// The entry at this position carries a different sequence number.
    SequenceGap { found: u64 },
    /// `prev_hash` does not match the previous entry's `current_hash`.
    PrevHashMismatch,
    /// Recomputing the entry's hash does not reproduce `current_hash`.
    ContentHashMismatch,
    /// The entry claims to belong to another tenant.
    ForeignTenant,
    /// The entry before the verified range is missing.
    MissingAnchor,
}

impl std::fmt::Display for BreakReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakReason::SequenceGap { found } => write!(f, "sequence gap (found {found})"),
            BreakReason::PrevHashMismatch => f.write_str("previous hash mismatch"),
            BreakReason::ContentHashMismatch => f.write_str("content hash mismatch"),
            BreakReason::ForeignTenant => f.write_str("entry belongs to another tenant"),
            BreakReason::MissingAnchor => f.write_str("anchor entry missing"),
        }
    }
}

/// Outcome of [`AuditLedger::verify_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainVerification {
    Intact { entries_checked: u64 },
    Broken { index: u64, reason: BreakReason },
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        matches!(self, ChainVerification::Intact { .. })
    }

    pub fn first_break(&self) -> Option<u64> {
        match self {
            ChainVerification::Intact { .. } => None,
            ChainVerification::Broken { index, .. } => Some(*index),
        }
    }
}

/// Filters for [`AuditLedger::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub actor_id: Option<PrincipalId>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub include_retired: bool,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor_id: impl Into<PrincipalId>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_time_range(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.until = Some(until);
        self
    }

    pub fn including_retired(mut self) -> Self {
        self.include_retired = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        if entry.retired && !self.include_retired {
            return false;
        }
        if self.actor_id.as_ref().is_some_and(|a| a != &entry.actor_id) {
            return false;
        }
        if self.action.is_some_and(|a| a != entry.action) {
            return false;
        }
        if self.from.is_some_and(|from| entry.timestamp < from) {
            return false;
        }
        if self.until.is_some_and(|until| entry.timestamp >= until) {
            return false;
        }
        true
    }
}

/// Compare-and-append loop shared by the ledger and its retry worker.
pub(crate) struct Appender<S> {
    store: Arc<S>,
    store_timeout: Duration,
    max_contention_retries: u32,
}

impl<S> Clone for Appender<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            store_timeout: self.store_timeout,
            max_contention_retries: self.max_contention_retries,
        }
    }
}

impl<S: AuditStore> Appender<S> {
    async fn timed<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| LedgerError::Timeout(self.store_timeout))?
            .map_err(LedgerError::from)
    }

    pub(crate) async fn append(
        &self,
        event: &AuditEvent,
        tenant_id: &TenantId,
    ) -> Result<AuditEntry> {
        for attempt in 0..=self.max_contention_retries {
            let tail = self.timed(self.store.tail(tenant_id)).await?;
            let (sequence, prev_hash) =
                tail.map_or((0, Hash::GENESIS), |t| (t.sequence + 1, t.hash));

            let entry = AuditEntry::link(event, tenant_id, sequence, prev_hash)?;
            match self.timed(self.store.append_if_tail(entry.clone(), prev_hash)).await {
                Ok(()) => {
                    debug!(
                        tenant = %tenant_id,
                        sequence,
                        action = ?entry.action,
                        "audit entry appended"
                    );
                    return Ok(entry);
                }
                Err(LedgerError::Store(StoreError::Conflict { .. })) => {
                    debug!(tenant = %tenant_id, sequence, attempt, "audit tail moved, relinking");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            tenant = %tenant_id,
            attempts = self.max_contention_retries + 1,
            "audit append lost every tail race"
        );
        Err(LedgerError::ContentionExhausted {
            tenant_id: tenant_id.clone(),
            attempts: self.max_contention_retries + 1,
        })
    }
}

/// Append-only, hash-chained audit log with one chain per tenant.
pub struct AuditLedger<S> {
    appender: Appender<S>,
    retries: mpsc::Sender<PendingAppend>,
    alerts: Arc<dyn AlertSink>,
}

impl<S: AuditStore> AuditLedger<S> {
    /// Creates the ledger and the worker that redelivers failed appends.
    ///
    /// The worker must be spawned (`tokio::spawn(worker.run())`); until then
    /// deferred events accumulate in the queue.
    pub fn new(
        store: Arc<S>,
        config: LedgerConfig,
        alerts: Arc<dyn AlertSink>,
    ) -> (Self, RetryWorker<S>) {
        let appender = Appender {
            store,
            store_timeout: config.store_timeout,
            max_contention_retries: config.max_contention_retries,
        };
        let (tx, rx) = mpsc::channel(config.retry_queue_capacity.max(1));
        let worker = RetryWorker::new(appender.clone(), rx, config.retry, Arc::clone(&alerts));
        (
            Self {
                appender,
                retries: tx,
                alerts,
            },
            worker,
        )
    }

    pub fn store(&self) -> &Arc<S> {
        &self.appender.store
    }

    /// Appends `event` to the tenant's chain and returns the stored entry.
    pub async fn append(&self, event: AuditEvent, tenant_id: &TenantId) -> Result<AuditEntry> {
        self.appender.append(&event, tenant_id).await
    }

    /// Best-effort append used alongside primary operations.
    ///
    /// Never fails: a failed append is queued for redelivery, and if the
    /// queue cannot take it an alert carrying the event is raised.
    pub async fn record(&self, event: AuditEvent, tenant_id: &TenantId) -> RecordOutcome {
        let error = match self.appender.append(&event, tenant_id).await {
            Ok(entry) => return RecordOutcome::Appended(entry),
            Err(error) => error,
        };
        warn!(
            tenant = %tenant_id,
            event_id = %event.id,
            action = ?event.action,
            error = %error,
            "audit append failed, deferring"
        );

        let pending = PendingAppend {
            tenant_id: tenant_id.clone(),
            event,
        };
        match self.retries.try_send(pending) {
            Ok(()) => RecordOutcome::Queued,
            Err(
                mpsc::error::TrySendError::Full(pending)
                | mpsc::error::TrySendError::Closed(pending),
            ) => {
                self.alerts.raise(SecurityAlert::AuditRetryUnavailable {
                    tenant_id: pending.tenant_id,
                    event: Box::new(pending.event),
                });
                RecordOutcome::Escalated
            }
        }
    }

    /// Recomputes the chain over `range` and reports the first broken index.
    ///
    /// Entries before `range.start` are trusted; the entry at
    /// `range.start - 1` anchors the first `prev_hash` check.
    pub async fn verify_chain(
        &self,
        tenant_id: &TenantId,
        range: Range<u64>,
    ) -> Result<ChainVerification> {
        let entries = self
            .appender
            .timed(self.appender.store.read_range(tenant_id, range.clone()))
            .await?;
        if entries.is_empty() {
            return Ok(ChainVerification::Intact { entries_checked: 0 });
        }

        let mut expected_prev = if range.start == 0 {
            Hash::GENESIS
        } else {
            let anchor = self
                .appender
                .timed(
                    self.appender
                        .store
                        .read_range(tenant_id, range.start - 1..range.start),
                )
                .await?;
            match anchor.first() {
                Some(entry) => entry.current_hash,
                None => {
                    return Ok(self.broken(tenant_id, range.start, BreakReason::MissingAnchor));
                }
            }
        };

        for (offset, entry) in (0u64..).zip(&entries) {
            let index = range.start + offset;
            let verdict = if entry.sequence != index {
                Some(BreakReason::SequenceGap {
                    found: entry.sequence,
                })
            } else if &entry.tenant_id != tenant_id {
                Some(BreakReason::ForeignTenant)
            } else if !hashes_match(&entry.prev_hash, &expected_prev) {
                Some(BreakReason::PrevHashMismatch)
            } else if !hashes_match(&entry.compute_hash()?, &entry.current_hash) {
                Some(BreakReason::ContentHashMismatch)
            } else {
                None
            };
            if let Some(reason) = verdict {
                return Ok(self.broken(tenant_id, index, reason));
            }
            expected_prev = entry.current_hash;
        }

        Ok(ChainVerification::Intact {
            entries_checked: entries.len() as u64,
        })
    }

    /// Verifies the tenant's whole chain.
    pub async fn verify_all(&self, tenant_id: &TenantId) -> Result<ChainVerification> {
        self.verify_chain(tenant_id, 0..u64::MAX).await
    }

    fn broken(&self, tenant_id: &TenantId, index: u64, reason: BreakReason) -> ChainVerification {
        error!(tenant = %tenant_id, index, %reason, "audit chain verification failed");
        self.alerts.raise(SecurityAlert::ChainBroken {
            tenant_id: tenant_id.clone(),
            index,
            reason: reason.to_string(),
        });
        ChainVerification::Broken { index, reason }
    }

    /// Entries matching `query`, oldest first.
    pub async fn query(&self, tenant_id: &TenantId, query: &AuditQuery) -> Result<Vec<AuditEntry>> {
        let entries = self
            .appender
            .timed(self.appender.store.read_range(tenant_id, 0..u64::MAX))
            .await?;
        let matching = entries.into_iter().filter(|entry| query.matches(entry));
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    /// Flags entries older than `retention` as retired and records the
    /// retirement in the chain. Returns the number of entries retired.
    ///
    /// The `EntriesRetired` entry is appended before any flag is set. If the
    /// append fails nothing is flagged and a later call retires the same
    /// entries.
    pub async fn retire_expired(
        &self,
        tenant_id: &TenantId,
        now: DateTime<Utc>,
        retention: chrono::Duration,
    ) -> Result<usize> {
        let cutoff = now - retention;
        let entries = self
            .appender
            .timed(self.appender.store.read_range(tenant_id, 0..u64::MAX))
            .await?;
        let expired: Vec<u64> = entries
            .iter()
            .filter(|entry| !entry.retired && entry.timestamp <= cutoff)
            .map(|entry| entry.sequence)
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        let event = AuditEvent::new(RETENTION_ACTOR, AuditAction::EntriesRetired)
            .at(now)
            .with_details(json!({
                "retired": expired.len(),
                "through_sequence": expired.last(),
                "cutoff": cutoff,
            }));
        self.append(event, tenant_id).await?;

        let flagged = self
            .appender
            .timed(self.appender.store.mark_retired(tenant_id, &expired))
            .await?;
        Ok(flagged)
    }
}
