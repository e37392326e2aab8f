//! # warden-audit: tamper-evident audit ledger
//!
//! Every tenant owns an append-only chain of [`AuditEntry`] values. Each
//! entry's `current_hash` covers its content and the previous entry's hash,
//! so modifying or removing any entry breaks every later link.
//!
//! # Example
//!
//! ```
//! # use std::sync::Arc;
//! # use warden_audit::*;
//! # use warden_types::TenantId;
//! # tokio_test_block_on(async {
//! let store = Arc::new(InMemoryAuditStore::new());
//! let alerts = Arc::new(TracingAlertSink);
//! let (ledger, _worker) = AuditLedger::new(store, LedgerConfig::default(), alerts);
//! let tenant = TenantId::parse("acme").unwrap();
//!
//! ledger.append(AuditEvent::new("alice", AuditAction::RecordCreated), &tenant).await.unwrap();
//! assert!(ledger.verify_all(&tenant).await.unwrap().is_intact());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

mod alert;
mod entry;
mod error;
mod ledger;
mod retry;
mod store;

pub use alert::{AlertSink, CollectingAlertSink, SecurityAlert, TracingAlertSink};
pub use entry::{AuditAction, AuditEntry, AuditEvent, AuditPayload};
pub use error::{LedgerError, Result, StoreError};
pub use ledger::{
    AuditLedger, AuditQuery, BreakReason, ChainVerification, LedgerConfig, RETENTION_ACTOR,
    RecordOutcome,
};
pub use retry::{RetryPolicy, RetryWorker};
pub use store::{AuditStore, ChainTail, InMemoryAuditStore};
