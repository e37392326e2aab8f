//! Operational and security alerts.

use std::sync::Mutex;

use tracing::error;
use warden_types::TenantId;

use crate::entry::AuditEvent;

/// Something an operator must look at.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityAlert {
    /// `verify_chain` found a broken link.
    ChainBroken {
        tenant_id: TenantId,
        index: u64,
        reason: String,
    },
    /// An audit event could not be written after every retry. The event is
    /// carried so it can be replayed by hand.
    AuditAppendExhausted {
        tenant_id: TenantId,
        event: Box<AuditEvent>,
        attempts: u32,
        last_error: String,
    },
    /// The retry queue refused an event.
    AuditRetryUnavailable {
        tenant_id: TenantId,
        event: Box<AuditEvent>,
    },
    /// Authenticated decryption failed for stored data.
    IntegrityViolation { tenant_id: TenantId, detail: String },
}

impl SecurityAlert {
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            SecurityAlert::ChainBroken { tenant_id, .. }
            | SecurityAlert::AuditAppendExhausted { tenant_id, .. }
            | SecurityAlert::AuditRetryUnavailable { tenant_id, .. }
            | SecurityAlert::IntegrityViolation { tenant_id, .. } => tenant_id,
        }
    }
}

/// Destination for alerts.
pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: SecurityAlert);
}

/// Writes alerts to the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn raise(&self, alert: SecurityAlert) {
        match &alert {
            SecurityAlert::ChainBroken {
                tenant_id,
                index,
                reason,
            } => error!(tenant = %tenant_id, index, reason = %reason, "audit chain broken"),
            SecurityAlert::AuditAppendExhausted {
                tenant_id,
                event,
                attempts,
                last_error,
            } => error!(
                tenant = %tenant_id,
                event_id = %event.id,
                action = ?event.action,
                attempts,
                last_error = %last_error,
                "audit append abandoned after retries"
            ),
            SecurityAlert::AuditRetryUnavailable { tenant_id, event } => error!(
                tenant = %tenant_id,
                event_id = %event.id,
                action = ?event.action,
                "audit retry queue unavailable"
            ),
            SecurityAlert::IntegrityViolation { tenant_id, detail } => {
                error!(tenant = %tenant_id, detail = %detail, "integrity violation");
            }
        }
    }
}

/// Keeps alerts in memory and forwards them to the log.
#[derive(Debug, Default)]
pub struct CollectingAlertSink {
    alerts: Mutex<Vec<SecurityAlert>>,
}

impl CollectingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

impl AlertSink for CollectingAlertSink {
    fn raise(&self, alert: SecurityAlert) {
        TracingAlertSink.raise(alert.clone());
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert);
        }
    }
}
