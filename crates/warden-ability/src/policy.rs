//! Rule definitions.
//!
//! Rules are typed and `'static`: role tables and overrides are constants,
//! never assembled from strings at runtime.

use serde::{Deserialize, Serialize};
use warden_types::{
    Action, DataClassification, MAX_SIGNATURE_AUTHORITY, Principal, ResourceRef, ResourceType,
    RiskLevel,
};

use crate::attributes::EnvironmentAttributes;

// ============================================================================
// Effect
// ============================================================================

/// The effect of a rule: allow or deny access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Effect {
    Allow,
    #[default]
    Deny,
}

// ============================================================================
// Signature thresholds
// ============================================================================

/// Signature authority required to sign or approve, by classification, plus
/// increments when the environment reports elevated risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureThresholds {
    pub internal: u8,
    pub confidential: u8,
    pub restricted: u8,
    pub high_risk_increment: u8,
    pub critical_risk_increment: u8,
}

impl Default for SignatureThresholds {
    fn default() -> Self {
        Self {
            internal: 1,
            confidential: 2,
            restricted: 3,
            high_risk_increment: 1,
            critical_risk_increment: 2,
        }
    }
}

impl SignatureThresholds {
    /// Required level, capped at [`MAX_SIGNATURE_AUTHORITY`].
    pub fn required(&self, classification: DataClassification, risk: Option<RiskLevel>) -> u8 {
        let base = match classification {
            DataClassification::Public => 0,
            DataClassification::Internal => self.internal,
            DataClassification::Confidential => self.confidential,
            DataClassification::Restricted => self.restricted,
        };
        let increment = match risk {
            Some(RiskLevel::High) => self.high_risk_increment,
            Some(RiskLevel::Critical) => self.critical_risk_increment,
            _ => 0,
        };
        base.saturating_add(increment).min(MAX_SIGNATURE_AUTHORITY)
    }
}

// ============================================================================
// Matchers and conditions
// ============================================================================

/// Matches a value against a fixed set, or anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher<T: 'static> {
    Any,
    Only(&'static [T]),
}

impl<T: PartialEq> Matcher<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Only(values) => values.contains(value),
        }
    }
}

/// A predicate over the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Principal and resource belong to different tenants.
    TenantMismatch,
    /// Some consent held by the principal has expired or been withdrawn
    /// without renewal.
    ConsentLapsed,
    MfaDisabled,
    ClassificationAtLeast(DataClassification),
    /// Principal's signature authority is below what the resource
    /// classification and environment risk require.
    SignatureAuthorityInsufficient,
    OutsideBusinessHours,
    /// Principal is listed as an owner of the resource.
    IsOwner,
    /// The declared purpose is not among the principal's authorized purposes.
    PurposeNotAuthorized,
    /// The environment reports a failed compliance evaluation.
    NonCompliantPosture,
    And(&'static [Condition]),
    Or(&'static [Condition]),
    Not(&'static Condition),
}

/// Everything a condition can look at.
pub(crate) struct Request<'a> {
    pub principal: &'a Principal,
    pub resource: &'a ResourceRef,
    pub env: &'a EnvironmentAttributes,
    pub thresholds: &'a SignatureThresholds,
}

impl Condition {
    pub(crate) fn evaluate(&self, req: &Request<'_>) -> bool {
        let attrs = &req.principal.attributes;
        match self {
            Condition::Always => true,
            Condition::TenantMismatch => {
                req.principal.tenant_id.as_ref() != req.resource.tenant_id()
            }
            Condition::ConsentLapsed => attrs.has_lapsed_consent(req.env.timestamp),
            Condition::MfaDisabled => !attrs.mfa_enabled,
            Condition::ClassificationAtLeast(min) => req.resource.classification() >= *min,
            Condition::SignatureAuthorityInsufficient => {
                let required = req
                    .thresholds
                    .required(req.resource.classification(), req.env.risk_level);
                attrs.signature_authority_level < required
            }
            Condition::OutsideBusinessHours => !req.env.is_business_hours,
            Condition::IsOwner => req.resource.is_owned_by(&req.principal.id),
            Condition::PurposeNotAuthorized => req
                .env
                .purpose
                .is_some_and(|purpose| !attrs.authorized_purposes.contains(&purpose)),
            Condition::NonCompliantPosture => req.env.compliant == Some(false),
            Condition::And(all) => all.iter().all(|c| c.evaluate(req)),
            Condition::Or(any) => any.iter().any(|c| c.evaluate(req)),
            Condition::Not(inner) => !inner.evaluate(req),
        }
    }
}

// ============================================================================
// Rule
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// Stable identifier, reported in decisions and audit entries.
    pub id: &'static str,
    pub effect: Effect,
    pub actions: Matcher<Action>,
    pub resources: Matcher<ResourceType>,
    pub condition: Condition,
    /// Generic explanation safe to show to the caller.
    pub reason: &'static str,
}

impl Rule {
    pub const fn allow(
        id: &'static str,
        actions: Matcher<Action>,
        resources: Matcher<ResourceType>,
    ) -> Self {
        Self {
            id,
            effect: Effect::Allow,
            actions,
            resources,
            condition: Condition::Always,
            reason: "granted by role",
        }
    }

    pub const fn deny(
        id: &'static str,
        actions: Matcher<Action>,
        resources: Matcher<ResourceType>,
        reason: &'static str,
    ) -> Self {
        Self {
            id,
            effect: Effect::Deny,
            actions,
            resources,
            condition: Condition::Always,
            reason,
        }
    }

    pub const fn when(self, condition: Condition) -> Self {
        Self { condition, ..self }
    }

    pub(crate) fn matches(&self, action: Action, req: &Request<'_>) -> bool {
        self.actions.matches(&action)
            && self.resources.matches(&req.resource.resource_type())
            && self.condition.evaluate(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DataClassification::Public, None, 0)]
    #[test_case(DataClassification::Internal, None, 1)]
    #[test_case(DataClassification::Confidential, None, 2)]
    #[test_case(DataClassification::Restricted, None, 3)]
    #[test_case(DataClassification::Restricted, Some(RiskLevel::Medium), 3)]
    #[test_case(DataClassification::Confidential, Some(RiskLevel::High), 3)]
    #[test_case(DataClassification::Restricted, Some(RiskLevel::Critical), 5)]
    fn required_signature_level(
        classification: DataClassification,
        risk: Option<RiskLevel>,
        expected: u8,
    ) {
        assert_eq!(
            SignatureThresholds::default().required(classification, risk),
            expected
        );
    }

    #[test]
    fn required_level_is_capped() {
        let thresholds = SignatureThresholds {
            restricted: 4,
            critical_risk_increment: 4,
            ..SignatureThresholds::default()
        };
        assert_eq!(
            thresholds.required(DataClassification::Restricted, Some(RiskLevel::Critical)),
            MAX_SIGNATURE_AUTHORITY
        );
    }

    #[test]
    fn matcher() {
        const READS: &[Action] = &[Action::Read, Action::Export];
        assert!(Matcher::Only(READS).matches(&Action::Export));
        assert!(!Matcher::Only(READS).matches(&Action::Delete));
        assert!(Matcher::<Action>::Any.matches(&Action::Delete));
    }

    #[test]
    fn default_effect_is_deny() {
        assert_eq!(Effect::default(), Effect::Deny);
    }
}
