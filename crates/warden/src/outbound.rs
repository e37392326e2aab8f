//! Outbound notifications.
//!
//! Events go into a bounded queue drained by a single [`OutboundWorker`].
//! Delivery is at-least-once: the worker retries with exponential backoff
//! until the sink acknowledges, and moves the event to the dead-letter list
//! after the last attempt. Sinks must tolerate duplicates; [`OutboundEvent::id`]
//! is stable across attempts.

use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use warden_audit::RetryPolicy;
use warden_types::{RiskLevel, TenantId};

use crate::{Result, WardenError};

/// Something a tenant's operators should hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    ComplianceFailed { subject: String, score: u32 },
    RiskElevated { assessment_id: Uuid, level: RiskLevel },
    AssessmentStatusChanged { assessment_id: Uuid, status: String },
    AuditChainBroken { index: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub created_at: DateTime<Utc>,
    pub notification: Notification,
}

impl OutboundEvent {
    pub fn new(tenant_id: TenantId, notification: Notification) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            created_at: Utc::now(),
            notification,
        }
    }
}

/// Rejected delivery. The worker retries until attempts run out.
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Transport for notifications (email, webhook, message bus).
pub trait OutboundSink: Send + Sync + 'static {
    fn deliver(
        &self,
        event: &OutboundEvent,
    ) -> impl Future<Output = std::result::Result<(), DeliveryError>> + Send;
}

/// An event that was never acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub event: OutboundEvent,
    pub attempts: u32,
    pub last_error: String,
}

type DeadLetters = Arc<Mutex<Vec<DeadLetter>>>;

fn push_dead_letter(dead_letters: &DeadLetters, letter: DeadLetter) {
    match dead_letters.lock() {
        Ok(mut letters) => letters.push(letter),
        Err(poisoned) => poisoned.into_inner().push(letter),
    }
}

/// Producer side of the notification queue.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<OutboundEvent>,
    dead_letters: DeadLetters,
}

impl OutboundQueue {
    /// Creates the queue and the worker that drains it.
    ///
    /// The worker must be spawned (`tokio::spawn(worker.run())`).
    pub fn new<K: OutboundSink>(
        sink: Arc<K>,
        capacity: usize,
        policy: RetryPolicy,
    ) -> (Self, OutboundWorker<K>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dead_letters = DeadLetters::default();
        let worker = OutboundWorker {
            sink,
            queue: rx,
            policy,
            dead_letters: Arc::clone(&dead_letters),
        };
        (Self { tx, dead_letters }, worker)
    }

    /// Enqueues without waiting.
    ///
    /// A full or closed queue dead-letters the event and returns a storage
    /// error; the event is never silently dropped.
    pub fn enqueue(&self, event: OutboundEvent) -> Result<()> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                Err(self.reject(event, "outbound queue full"))
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                Err(self.reject(event, "outbound worker stopped"))
            }
        }
    }

    fn reject(&self, event: OutboundEvent, reason: &str) -> WardenError {
        warn!(
            tenant = %event.tenant_id,
            event_id = %event.id,
            reason,
            "notification dead-lettered"
        );
        push_dead_letter(
            &self.dead_letters,
            DeadLetter {
                event,
                attempts: 0,
                last_error: reason.to_string(),
            },
        );
        WardenError::Storage(reason.to_string())
    }

    /// Snapshot of the events that could not be delivered.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        match self.dead_letters.lock() {
            Ok(letters) => letters.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Takes every dead letter, leaving the list empty. Operators replay or
    /// archive what this returns.
    pub fn drain_dead_letters(&self) -> Vec<DeadLetter> {
        match self.dead_letters.lock() {
            Ok(mut letters) => std::mem::take(&mut *letters),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

/// Consumer side. [`OutboundWorker::run`] returns once every queue handle is
/// dropped and the queue is empty.
pub struct OutboundWorker<K> {
    sink: Arc<K>,
    queue: mpsc::Receiver<OutboundEvent>,
    policy: RetryPolicy,
    dead_letters: DeadLetters,
}

impl<K: OutboundSink> OutboundWorker<K> {
    pub async fn run(mut self) {
        while let Some(event) = self.queue.recv().await {
            self.deliver(event).await;
        }
        debug!("outbound worker stopped");
    }

    async fn deliver(&self, event: OutboundEvent) {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.policy.backoff(attempt - 1)).await;
            }
            match self.sink.deliver(&event).await {
                Ok(()) => {
                    info!(
                        tenant = %event.tenant_id,
                        event_id = %event.id,
                        attempt,
                        "notification delivered"
                    );
                    return;
                }
                Err(e) => {
                    warn!(
                        tenant = %event.tenant_id,
                        event_id = %event.id,
                        attempt,
                        error = %e,
                        "notification delivery failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        error!(
            tenant = %event.tenant_id,
            event_id = %event.id,
            attempts,
            "notification dead-lettered after exhausting retries"
        );
        push_dead_letter(
            &self.dead_letters,
            DeadLetter {
                event,
                attempts,
                last_error,
            },
        );
    }
}

/// Sink that records deliveries in memory. Failing the first `fail_first`
/// calls exercises the retry path.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<OutboundEvent>>,
    calls: Mutex<u32>,
    fail_first: u32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(fail_first: u32) -> Self {
        Self {
            fail_first,
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Vec<OutboundEvent> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> u32 {
        self.calls.lock().map(|c| *c).unwrap_or_default()
    }
}

impl OutboundSink for RecordingSink {
    async fn deliver(&self, event: &OutboundEvent) -> std::result::Result<(), DeliveryError> {
        let call = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| DeliveryError("sink lock poisoned".to_string()))?;
            *calls += 1;
            *calls
        };
        if call <= self.fail_first {
            return Err(DeliveryError(format!("transport refused call {call}")));
        }
        self.delivered
            .lock()
            .map_err(|_| DeliveryError("sink lock poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }

    fn event() -> OutboundEvent {
        OutboundEvent::new(
            TenantId::parse("acme").unwrap(),
            Notification::ComplianceFailed {
                subject: "client-9".to_string(),
                score: 40,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_after_transient_failures() {
        let sink = Arc::new(RecordingSink::failing_first(2));
        let (queue, worker) = OutboundQueue::new(Arc::clone(&sink), 8, policy(5));
        let handle = tokio::spawn(worker.run());

        let sent = event();
        queue.enqueue(sent.clone()).unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(sink.calls(), 3);
        assert_eq!(sink.delivered(), vec![sent]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_letters_after_max_attempts() {
        let sink = Arc::new(RecordingSink::failing_first(u32::MAX));
        let (queue, worker) = OutboundQueue::new(Arc::clone(&sink), 8, policy(3));
        let observer = queue.clone();
        let handle = tokio::spawn(worker.run());

        queue.enqueue(event()).unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(sink.calls(), 3);
        let letters = observer.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].attempts, 3);
        assert!(letters[0].last_error.contains("transport refused"));
    }

    #[tokio::test]
    async fn test_full_queue_dead_letters_instead_of_dropping() {
        let sink = Arc::new(RecordingSink::new());
        let (queue, _worker) = OutboundQueue::new(sink, 1, policy(1));

        queue.enqueue(event()).unwrap();
        let err = queue.enqueue(event()).unwrap_err();

        assert!(matches!(err, WardenError::Storage(_)));
        assert_eq!(queue.dead_letters().len(), 1);
        assert_eq!(queue.dead_letters()[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_drain_empties_dead_letters() {
        let sink = Arc::new(RecordingSink::new());
        let (queue, _worker) = OutboundQueue::new(sink, 1, policy(1));

        queue.enqueue(event()).unwrap();
        for _ in 0..3 {
            queue.enqueue(event()).unwrap_err();
        }

        let drained = queue.drain_dead_letters();
        assert_eq!(drained.len(), 3);
        assert!(queue.dead_letters().is_empty());
        assert!(queue.drain_dead_letters().is_empty());

        queue.enqueue(event()).unwrap_err();
        assert_eq!(queue.dead_letters().len(), 1);
    }

    #[test]
    fn test_notification_wire_format() {
        let json = serde_json::to_value(Notification::AuditChainBroken { index: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "audit_chain_broken", "index": 4}));
    }
}
