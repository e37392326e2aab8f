//! Background redelivery of audit events whose first append failed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};
use warden_config::AuditConfig;
use warden_types::TenantId;

use crate::alert::{AlertSink, SecurityAlert};
use crate::entry::AuditEvent;
use crate::error::{LedgerError, StoreError};
use crate::ledger::Appender;
use crate::store::AuditStore;

/// Exponential backoff schedule for redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before `attempt` (1-based): `initial * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&AuditConfig::default())
    }
}

impl From<&AuditConfig> for RetryPolicy {
    fn from(audit: &AuditConfig) -> Self {
        Self {
            max_attempts: audit.retry_max_attempts,
            initial_backoff: audit.retry_initial_backoff(),
            max_backoff: audit.retry_max_backoff(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct PendingAppend {
    pub(crate) tenant_id: TenantId,
    pub(crate) event: AuditEvent,
}

/// A pending append waiting for its next attempt.
#[derive(Debug)]
struct Scheduled {
    pending: PendingAppend,
    /// Attempt number the next redelivery will be, 1-based.
    attempt: u32,
    last_error: String,
}

/// Drains the retry queue. Spawn [`RetryWorker::run`] on the runtime; it
/// returns once the owning ledger is dropped and every pending event has
/// been appended or escalated.
///
/// Each event keeps its own due time. Whichever event is due first is
/// attempted next, so an event that keeps failing never holds back the
/// events queued behind it.
pub struct RetryWorker<S> {
    appender: Appender<S>,
    queue: mpsc::Receiver<PendingAppend>,
    policy: RetryPolicy,
    alerts: Arc<dyn AlertSink>,
}

impl<S: AuditStore> RetryWorker<S> {
    pub(crate) fn new(
        appender: Appender<S>,
        queue: mpsc::Receiver<PendingAppend>,
        policy: RetryPolicy,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            appender,
            queue,
            policy,
            alerts,
        }
    }

    pub async fn run(mut self) {
        // Keyed by (due, arrival) so equal due times keep arrival order.
        let mut schedule: BTreeMap<(Instant, u64), Scheduled> = BTreeMap::new();
        let mut arrivals = 0u64;
        let mut open = true;

        loop {
            let next_due = schedule.keys().next().map(|(due, _)| *due);
            if !open && next_due.is_none() {
                break;
            }

            tokio::select! {
                received = self.queue.recv(), if open => match received {
                    Some(pending) => {
                        let due = Instant::now() + self.policy.backoff(1);
                        schedule.insert(
                            (due, arrivals),
                            Scheduled {
                                pending,
                                attempt: 1,
                                last_error: String::new(),
                            },
                        );
                        arrivals += 1;
                    }
                    None => open = false,
                },
                () = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                    if let Some(((_, arrival), scheduled)) = schedule.pop_first() {
                        if let Some(again) = self.redeliver(scheduled).await {
                            let due = Instant::now() + self.policy.backoff(again.attempt);
                            schedule.insert((due, arrival), again);
                        }
                    }
                }
            }
        }
        debug!("audit retry worker stopped");
    }

    /// One delivery attempt. Returns the event when it should be tried again.
    async fn redeliver(&self, mut scheduled: Scheduled) -> Option<Scheduled> {
        let PendingAppend { tenant_id, event } = &scheduled.pending;
        let attempt = scheduled.attempt;

        match self.appender.append(event, tenant_id).await {
            Ok(entry) => {
                info!(
                    tenant = %tenant_id,
                    sequence = entry.sequence,
                    attempt,
                    "deferred audit event appended"
                );
                return None;
            }
            Err(LedgerError::Store(StoreError::Duplicate(id))) => {
                debug!(
                    tenant = %tenant_id,
                    event_id = %id,
                    "deferred audit event already present"
                );
                return None;
            }
            Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                warn!(tenant = %tenant_id, attempt, error = %e, "audit retry failed");
                scheduled.last_error = e.to_string();
                scheduled.attempt += 1;
                return Some(scheduled);
            }
            Err(e) => scheduled.last_error = e.to_string(),
        }

        let Scheduled {
            pending: PendingAppend { tenant_id, event },
            attempt,
            last_error,
        } = scheduled;
        self.alerts.raise(SecurityAlert::AuditAppendExhausted {
            tenant_id,
            event: Box::new(event),
            attempts: attempt,
            last_error,
        });
        None
    }
}
