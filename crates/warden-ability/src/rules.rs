//! Role rule tables and global overrides.
//!
//! Evaluation order is the role's table followed by [`OVERRIDES`]; the last
//! matching rule decides. Overrides therefore take precedence over any role
//! grant.

use warden_types::{Action, DataClassification, ResourceType, Role};

use crate::policy::{Condition, Matcher, Rule};

use Action::{Approve, Create, Delete, Export, Read, Sign, Update};
use ResourceType::{
    AuditLog, ComplianceReport, CustomerRecord, Document, Policy, RiskAssessment, Transaction,
};

const ANY: Matcher<Action> = Matcher::Any;
const ANYWHERE: Matcher<ResourceType> = Matcher::Any;

const fn acts(actions: &'static [Action]) -> Matcher<Action> {
    Matcher::Only(actions)
}

const fn on(resources: &'static [ResourceType]) -> Matcher<ResourceType> {
    Matcher::Only(resources)
}

// ============================================================================
// Role tables
// ============================================================================

const ADMIN: &[Rule] = &[Rule::allow("admin-manage-all", ANY, ANYWHERE)];

const PARTNER: &[Rule] = &[
    Rule::allow(
        "partner-manage-engagements",
        acts(&[Create, Read, Update, Export, Approve, Sign]),
        ANYWHERE,
    ),
    Rule::allow(
        "partner-delete-work-product",
        acts(&[Delete]),
        on(&[Document, RiskAssessment]),
    ),
];

const COMPLIANCE_OFFICER: &[Rule] = &[
    Rule::allow(
        "compliance-manage-reports",
        acts(&[Create, Read, Update, Export, Approve, Sign]),
        on(&[ComplianceReport, Policy]),
    ),
    Rule::allow(
        "compliance-manage-risk",
        acts(&[Create, Read, Update]),
        on(&[RiskAssessment]),
    ),
    Rule::allow(
        "compliance-read-evidence",
        acts(&[Read]),
        on(&[AuditLog, CustomerRecord, Transaction, Document]),
    ),
    Rule::allow("compliance-export-audit", acts(&[Export]), on(&[AuditLog])),
];

const RISK_ANALYST: &[Rule] = &[
    Rule::allow(
        "risk-manage-assessments",
        acts(&[Create, Read, Update, Export]),
        on(&[RiskAssessment]),
    ),
    Rule::allow(
        "risk-read-inputs",
        acts(&[Read]),
        on(&[ComplianceReport, CustomerRecord, Transaction]),
    ),
];

const ASSOCIATE: &[Rule] = &[
    Rule::allow(
        "associate-read",
        acts(&[Read]),
        on(&[Document, CustomerRecord, RiskAssessment, ComplianceReport]),
    ),
    Rule::allow("associate-create-documents", acts(&[Create]), on(&[Document])),
    Rule::allow("associate-update-own-documents", acts(&[Update]), on(&[Document]))
        .when(Condition::IsOwner),
    Rule::deny(
        "associate-no-delete",
        acts(&[Delete]),
        ANYWHERE,
        "associates cannot delete records",
    ),
];

const AUDITOR: &[Rule] = &[
    Rule::allow(
        "auditor-read-evidence",
        acts(&[Read]),
        on(&[AuditLog, ComplianceReport, RiskAssessment, Policy]),
    ),
    Rule::allow(
        "auditor-export-evidence",
        acts(&[Export]),
        on(&[AuditLog, ComplianceReport]),
    ),
];

const CLIENT: &[Rule] = &[Rule::allow(
    "client-read-own-records",
    acts(&[Read]),
    on(&[Document, CustomerRecord]),
)
.when(Condition::IsOwner)];

/// Rule table for a role, in evaluation order.
pub fn role_rules(role: Role) -> &'static [Rule] {
    match role {
        Role::Admin => ADMIN,
        Role::Partner => PARTNER,
        Role::ComplianceOfficer => COMPLIANCE_OFFICER,
        Role::RiskAnalyst => RISK_ANALYST,
        Role::Associate => ASSOCIATE,
        Role::Auditor => AUDITOR,
        Role::Client => CLIENT,
    }
}

// ============================================================================
// Global overrides
// ============================================================================

pub const TENANT_BOUNDARY: &str = "tenant-boundary";
pub const CONSENT_EXPIRED: &str = "consent-expired";
pub const MFA_REQUIRED_RESTRICTED: &str = "mfa-required-restricted";
pub const SIGNATURE_AUTHORITY_INSUFFICIENT: &str = "signature-authority-insufficient";
pub const TIME_WINDOW: &str = "time-window";
pub const PURPOSE_NOT_AUTHORIZED: &str = "purpose-not-authorized";
pub const COMPLIANCE_HOLD_EXPORT: &str = "compliance-hold-export";

/// Deny rules appended after every role table, in this order.
pub const OVERRIDES: &[Rule] = &[
    Rule::deny(
        TENANT_BOUNDARY,
        ANY,
        ANYWHERE,
        "resource belongs to another tenant",
    )
    .when(Condition::TenantMismatch),
    Rule::deny(CONSENT_EXPIRED, ANY, ANYWHERE, "consent has lapsed")
        .when(Condition::ConsentLapsed),
    Rule::deny(
        MFA_REQUIRED_RESTRICTED,
        ANY,
        ANYWHERE,
        "multi-factor authentication required for restricted data",
    )
    .when(Condition::And(&[
        Condition::ClassificationAtLeast(DataClassification::Restricted),
        Condition::MfaDisabled,
    ])),
    Rule::deny(
        SIGNATURE_AUTHORITY_INSUFFICIENT,
        acts(&[Sign, Approve]),
        ANYWHERE,
        "insufficient signature authority",
    )
    .when(Condition::SignatureAuthorityInsufficient),
    Rule::deny(
        TIME_WINDOW,
        acts(&[Delete, Export]),
        on(&[AuditLog, CustomerRecord, Transaction]),
        "operation only permitted during business hours",
    )
    .when(Condition::OutsideBusinessHours),
    Rule::deny(
        PURPOSE_NOT_AUTHORIZED,
        acts(&[Read, Export]),
        on(&[CustomerRecord]),
        "declared purpose not authorized",
    )
    .when(Condition::PurposeNotAuthorized),
    Rule::deny(
        COMPLIANCE_HOLD_EXPORT,
        acts(&[Export]),
        ANYWHERE,
        "exports suspended while compliance evaluation is failing",
    )
    .when(Condition::NonCompliantPosture),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn rule_ids_are_unique() {
        let mut seen = HashSet::new();
        let all = Role::all()
            .iter()
            .flat_map(|role| role_rules(*role).iter())
            .chain(OVERRIDES.iter());
        for rule in all {
            assert!(seen.insert(rule.id), "duplicate rule id {}", rule.id);
        }
    }

    #[test]
    fn overrides_only_deny() {
        assert!(
            OVERRIDES
                .iter()
                .all(|r| r.effect == crate::policy::Effect::Deny)
        );
    }

    #[test]
    fn override_order() {
        let ids: Vec<_> = OVERRIDES.iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                TENANT_BOUNDARY,
                CONSENT_EXPIRED,
                MFA_REQUIRED_RESTRICTED,
                SIGNATURE_AUTHORITY_INSUFFICIENT,
                TIME_WINDOW,
                PURPOSE_NOT_AUTHORIZED,
                COMPLIANCE_HOLD_EXPORT,
            ]
        );
    }
}
