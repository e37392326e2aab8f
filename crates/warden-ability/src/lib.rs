//! # warden-ability: authorization decisions
//!
//! Combines per-role grant tables with global attribute-based overrides.
//!
//! ```text
//! (principal, resource, action, environment)
//!         │
//!         ├─ tenant missing? ──────────────► DENY tenant-context-missing
//!         ▼
//!   role rules ++ overrides
//!         │   last matching rule wins
//!         ▼
//!   Decision { effect, matched_rule, reason }   (no match: DENY default-deny)
//! ```
//!
//! Overrides, in order: tenant boundary, lapsed consent, MFA for restricted
//! data, signature authority for sign/approve, business-hours window for
//! destructive operations on sensitive records, purpose limitation on
//! customer records, and an export hold while compliance is failing.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use warden_ability::{AbilityEngine, EnvironmentAttributes};
//! use warden_types::{Action, Principal, ResourceRef, ResourceType, Role, TenantId};
//!
//! let tenant = TenantId::parse("acme").unwrap();
//! let auditor = Principal::new("auditor-7", tenant.clone(), Role::Auditor);
//! let log = ResourceRef::new(tenant, ResourceType::AuditLog, "2025-q1");
//! let env = EnvironmentAttributes::from_timestamp(Utc::now());
//!
//! let decision = AbilityEngine::default().decide(&auditor, &log, Action::Read, &env);
//! assert!(decision.is_allowed());
//! ```

use thiserror::Error;

mod attributes;
mod evaluator;
mod policy;
pub mod rules;

pub use attributes::{BusinessHours, EnvironmentAttributes};
pub use evaluator::{AbilityConfig, AbilityEngine, DEFAULT_DENY, Decision, TENANT_CONTEXT_MISSING};
pub use policy::{Condition, Effect, Matcher, Rule, SignatureThresholds};

/// Result type for authorization checks
pub type Result<T> = std::result::Result<T, AbilityError>;

#[derive(Debug, Error)]
pub enum AbilityError {
    /// Carries only the rule id and its generic reason.
    #[error("Access denied by rule '{matched_rule}': {reason}")]
    Denied { matched_rule: String, reason: String },
}
