//! Sarbanes-Oxley internal control checks for financial reporting systems.

use warden_types::Severity;

use crate::ComplianceFramework;
use crate::rule::{ComplianceRule, FrameworkCatalog, risk_from_findings};

/// Seven-year record retention, Section 802.
pub const MIN_RETENTION_DAYS: u32 = 2555;

/// Maximum age of the last user access review.
pub const MAX_ACCESS_REVIEW_AGE_DAYS: u32 = 90;

pub const RULES: &[ComplianceRule] = &[
    ComplianceRule {
        id: "SOX-001",
        severity: Severity::Critical,
        description: "Financial controls not attested by management (Section 302)",
        remediation: "Obtain officer certification of disclosure controls",
        check: |ctx| !ctx.data.financial_reporting || ctx.governance.financial_controls_attested,
    },
    ComplianceRule {
        id: "SOX-002",
        severity: Severity::High,
        description: "No segregation of duties over financial records (Section 404)",
        remediation: "Separate preparation, approval and posting responsibilities",
        check: |ctx| !ctx.data.financial_reporting || ctx.governance.segregation_of_duties,
    },
    ComplianceRule {
        id: "SOX-003",
        severity: Severity::High,
        description: "Changes to financial systems are not approved (Section 404)",
        remediation: "Route production changes through a documented approval step",
        check: |ctx| !ctx.data.financial_reporting || ctx.governance.change_approval,
    },
    ComplianceRule {
        id: "SOX-004",
        severity: Severity::High,
        description: "No audit trail on financial records",
        remediation: "Enable tamper-evident audit logging",
        check: |ctx| !ctx.data.financial_reporting || ctx.controls.audit_logging,
    },
    ComplianceRule {
        id: "SOX-005",
        severity: Severity::Medium,
        description: "Records retained for less than seven years (Section 802)",
        remediation: "Extend retention of audit and financial records to seven years",
        check: |ctx| {
            !ctx.data.financial_reporting
                || ctx
                    .data
                    .retention_days
                    .is_some_and(|days| days >= MIN_RETENTION_DAYS)
        },
    },
    ComplianceRule {
        id: "SOX-006",
        severity: Severity::Medium,
        description: "User access not reviewed within the last quarter",
        remediation: "Perform and document a quarterly access review",
        check: |ctx| {
            !ctx.data.financial_reporting
                || ctx
                    .controls
                    .access_review_age_days
                    .is_some_and(|days| days <= MAX_ACCESS_REVIEW_AGE_DAYS)
        },
    },
];

pub const CATALOG: FrameworkCatalog = FrameworkCatalog {
    framework: ComplianceFramework::SOX,
    rules: RULES,
    risk_profile: risk_from_findings,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::compliant_context;
    use test_case::test_case;

    #[test_case(Some(90), true)]
    #[test_case(Some(91), false)]
    #[test_case(None, false)]
    fn access_review_age(days: Option<u32>, ok: bool) {
        let mut ctx = compliant_context();
        ctx.controls.access_review_age_days = days;
        let failing: Vec<_> = RULES.iter().filter(|r| !(r.check)(&ctx)).map(|r| r.id).collect();
        assert_eq!(failing.is_empty(), ok);
        if !ok {
            assert_eq!(failing, vec!["SOX-006"]);
        }
    }
}
