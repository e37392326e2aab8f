//! HIPAA Security Rule checks. Only apply when health data is processed.

use warden_types::Severity;

use crate::ComplianceFramework;
use crate::rule::{ComplianceRule, FrameworkCatalog, risk_from_findings};

/// Six-year documentation retention, 45 CFR 164.316(b)(2).
pub const MIN_RETENTION_DAYS: u32 = 2190;

pub const RULES: &[ComplianceRule] = &[
    ComplianceRule {
        id: "HIPAA-001",
        severity: Severity::Critical,
        description: "ePHI not encrypted at rest (164.312(a)(2)(iv))",
        remediation: "Encrypt protected health information at rest",
        check: |ctx| !ctx.data.health_data || ctx.controls.encrypted_at_rest,
    },
    ComplianceRule {
        id: "HIPAA-002",
        severity: Severity::High,
        description: "ePHI not encrypted in transit (164.312(e)(1))",
        remediation: "Require TLS for every channel carrying health data",
        check: |ctx| !ctx.data.health_data || ctx.controls.encrypted_in_transit,
    },
    ComplianceRule {
        id: "HIPAA-003",
        severity: Severity::High,
        description: "No audit controls on systems holding ePHI (164.312(b))",
        remediation: "Enable audit logging for all access to health data",
        check: |ctx| !ctx.data.health_data || ctx.controls.audit_logging,
    },
    ComplianceRule {
        id: "HIPAA-004",
        severity: Severity::High,
        description: "No business associate agreement in place (164.308(b))",
        remediation: "Execute a BAA with every business associate",
        check: |ctx| !ctx.data.health_data || ctx.governance.business_associate_agreement,
    },
    ComplianceRule {
        id: "HIPAA-005",
        severity: Severity::Medium,
        description: "Retention shorter than six years (164.316(b)(2))",
        remediation: "Retain documentation for at least six years",
        check: |ctx| {
            !ctx.data.health_data
                || ctx
                    .data
                    .retention_days
                    .is_some_and(|days| days >= MIN_RETENTION_DAYS)
        },
    },
    ComplianceRule {
        id: "HIPAA-006",
        severity: Severity::Medium,
        description: "Person or entity authentication is single-factor (164.312(d))",
        remediation: "Enforce multi-factor authentication",
        check: |ctx| !ctx.data.health_data || ctx.controls.mfa_enforced,
    },
];

pub const CATALOG: FrameworkCatalog = FrameworkCatalog {
    framework: ComplianceFramework::HIPAA,
    rules: RULES,
    risk_profile: risk_from_findings,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::compliant_context;
    use test_case::test_case;

    #[test_case(Some(2189), false)]
    #[test_case(Some(2190), true)]
    #[test_case(None, false)]
    fn retention_threshold(days: Option<u32>, ok: bool) {
        let mut ctx = compliant_context();
        ctx.data.retention_days = days;
        let rule = RULES.iter().find(|r| r.id == "HIPAA-005").unwrap();
        assert_eq!((rule.check)(&ctx), ok);
    }

    #[test]
    fn no_health_data_means_nothing_applies() {
        let mut ctx = compliant_context();
        ctx.data.health_data = false;
        ctx.controls.encrypted_at_rest = false;
        ctx.governance.business_associate_agreement = false;
        assert!(RULES.iter().all(|r| (r.check)(&ctx)));
    }
}
