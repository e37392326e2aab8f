//! Know-your-customer identification checks.

use warden_types::Severity;

use crate::ComplianceFramework;
use crate::rule::{ComplianceRule, FrameworkCatalog, risk_from_findings};

pub const RULES: &[ComplianceRule] = &[
    ComplianceRule {
        id: "KYC-001",
        severity: Severity::Critical,
        description: "Customer identity not verified",
        remediation: "Verify identity against a government-issued document",
        check: |ctx| ctx.customer.as_ref().is_none_or(|c| c.identity_verified),
    },
    ComplianceRule {
        id: "KYC-002",
        severity: Severity::High,
        description: "Beneficial owners not identified",
        remediation: "Identify every natural person owning 25% or more",
        check: |ctx| ctx.customer.as_ref().is_none_or(|c| c.beneficial_owners_identified),
    },
    ComplianceRule {
        id: "KYC-003",
        severity: Severity::Medium,
        description: "Identity document expired or expiry not recorded",
        remediation: "Collect a current identity document",
        check: |ctx| {
            ctx.customer
                .as_ref()
                .is_none_or(|c| c.id_document_expires.is_some_and(|at| at > ctx.as_of))
        },
    },
];

pub const CATALOG: FrameworkCatalog = FrameworkCatalog {
    framework: ComplianceFramework::KYC,
    rules: RULES,
    risk_profile: risk_from_findings,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::compliant_context;

    #[test]
    fn expired_document_fails() {
        let mut ctx = compliant_context();
        let as_of = ctx.as_of;
        ctx.customer.as_mut().unwrap().id_document_expires = Some(as_of);
        let failing: Vec<_> = RULES.iter().filter(|r| !(r.check)(&ctx)).map(|r| r.id).collect();
        assert_eq!(failing, vec!["KYC-003"]);
    }
}
