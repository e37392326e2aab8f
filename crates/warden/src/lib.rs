//! # Warden
//!
//! Multi-tenant authorization, field encryption, audit and compliance core.
//!
//! A [`Warden`] is built once from a [`WardenConfig`] and a set of
//! [`Backends`], then passed by reference to request handlers. Each operation
//! runs the same pipeline:
//!
//! ```text
//! (principal, resource, action, environment)
//!         │
//!         ▼
//!   AbilityEngine ── deny ──► WardenError::Authorization { matched_rule, .. }
//!         │ allow
//!         ▼
//!   FieldCodec (seal / open)      ComplianceRuleEngine / RiskScoringEngine
//!         │                                   │
//!         └──────────────┬────────────────────┘
//!                        ▼
//!          AuditLedger (per-tenant hash chain)
//!                        │
//!                        ▼
//!          OutboundQueue ──► OutboundSink (at-least-once)
//! ```
//!
//! Risk and compliance outputs flow back into authorization through
//! [`Warden::environment`]: an elevated tenant risk level raises the
//! signature authority required to approve, and a failing compliance
//! posture blocks exports.
//!
//! # Quick Start
//!
//! ```ignore
//! use warden::{Backends, Warden, WardenConfig};
//!
//! let config = WardenConfig::load()?;
//! warden::telemetry::init(&config.telemetry)?;
//!
//! let (warden, workers) = Warden::bootstrap(&config, Backends::in_memory())?;
//! workers.spawn();
//!
//! let env = warden.environment(&tenant, Utc::now()).await?;
//! let sealed = warden.seal_field(&principal, &record, Action::Update, &ssn, &env).await?;
//! ```

mod codec;
mod error;
pub mod outbound;
pub mod repository;
pub mod telemetry;
mod warden;

pub use codec::{FieldCodec, Sealed};
pub use error::{Result, WardenError};
pub use outbound::{
    DeadLetter, DeliveryError, Notification, OutboundEvent, OutboundQueue, OutboundSink,
    OutboundWorker, RecordingSink,
};
pub use repository::{
    AssessmentRepository, ComplianceRecord, InMemoryAssessmentRepository, RepositoryError,
};
pub use warden::{Backends, Transition, Warden, WardenWorkers};

// Re-export component crates for callers that need the full surface
pub use warden_ability as ability;
pub use warden_audit as audit;
pub use warden_compliance as compliance;
pub use warden_config as config;
pub use warden_crypto as crypto;
pub use warden_risk as risk;
pub use warden_types as types;

// Re-export the types most handlers touch
pub use warden_ability::{Decision, EnvironmentAttributes};
pub use warden_audit::{AuditQuery, ChainVerification};
pub use warden_compliance::{AssessmentContext, ComplianceFramework, ComplianceResult};
pub use warden_config::WardenConfig;
pub use warden_risk::{RiskAssessment, RiskFactor};
pub use warden_types::{
    Action, DataClassification, Principal, ResourceRef, ResourceType, Role, TenantId,
};
