//! GDPR rules. Everything except breach notification only applies when
//! personal data is processed.

use warden_types::{DataClassification, Severity};

use crate::context::{AssessmentContext, LawfulBasis};
use crate::rule::{ComplianceRule, FrameworkCatalog, risk_from_findings};
use crate::ComplianceFramework;

/// Article 33 notification deadline.
pub const BREACH_NOTIFICATION_HOURS: u32 = 72;

pub const RULES: &[ComplianceRule] = &[
    ComplianceRule {
        id: "GDPR-001",
        severity: Severity::High,
        description: "Personal data processed without a documented lawful basis (Art. 6)",
        remediation: "Record the lawful basis for each processing activity",
        check: |ctx| !ctx.data.personal_data || ctx.data.lawful_basis.is_some(),
    },
    ComplianceRule {
        id: "GDPR-002",
        severity: Severity::High,
        description: "Processing relies on consent that was not obtained (Art. 7)",
        remediation: "Obtain and record consent before processing, or change the lawful basis",
        check: |ctx| {
            !ctx.data.personal_data
                || ctx.data.lawful_basis != Some(LawfulBasis::Consent)
                || ctx.data.consent_obtained
        },
    },
    ComplianceRule {
        id: "GDPR-003",
        severity: Severity::Medium,
        description: "Data minimization not applied (Art. 5(1)(c))",
        remediation: "Limit collected fields to what the stated purpose requires",
        check: |ctx| !ctx.data.personal_data || ctx.data.data_minimized,
    },
    ComplianceRule {
        id: "GDPR-004",
        severity: Severity::Medium,
        description: "No retention period defined for personal data (Art. 5(1)(e))",
        remediation: "Define a retention period and schedule deletion",
        check: |ctx| !ctx.data.personal_data || ctx.data.retention_days.is_some(),
    },
    ComplianceRule {
        id: "GDPR-005",
        severity: Severity::High,
        description: "Personal data not encrypted at rest (Art. 32)",
        remediation: "Enable field-level or storage encryption for personal data",
        check: |ctx| !ctx.data.personal_data || ctx.controls.encrypted_at_rest,
    },
    ComplianceRule {
        id: "GDPR-006",
        severity: Severity::Critical,
        description: "Cross-border transfer without appropriate safeguards (Chapter V)",
        remediation: "Put standard contractual clauses or an adequacy decision in place",
        check: |ctx| {
            !ctx.data.personal_data
                || !ctx.data.cross_border_transfer
                || ctx.data.transfer_safeguards
        },
    },
    ComplianceRule {
        id: "GDPR-007",
        severity: Severity::High,
        description: "Breach notification exceeded 72 hours (Art. 33)",
        remediation: "Review the incident response runbook and notification chain",
        check: |ctx| {
            ctx.governance
                .breach_notification_hours
                .is_none_or(|hours| hours <= BREACH_NOTIFICATION_HOURS)
        },
    },
    ComplianceRule {
        id: "GDPR-008",
        severity: Severity::Medium,
        description: "No data protection officer for special-category or restricted data (Art. 37)",
        remediation: "Appoint a data protection officer",
        check: |ctx| !requires_dpo(ctx) || ctx.governance.dpo_appointed,
    },
];

fn requires_dpo(ctx: &AssessmentContext) -> bool {
    ctx.data.personal_data
        && (ctx.data.health_data || ctx.data.classification == DataClassification::Restricted)
}

pub const CATALOG: FrameworkCatalog = FrameworkCatalog {
    framework: ComplianceFramework::GDPR,
    rules: RULES,
    risk_profile: risk_from_findings,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::compliant_context;
    use test_case::test_case;

    fn failing(ctx: &AssessmentContext) -> Vec<&'static str> {
        RULES.iter().filter(|r| !(r.check)(ctx)).map(|r| r.id).collect()
    }

    #[test]
    fn no_personal_data_means_nothing_applies() {
        let mut ctx = compliant_context();
        ctx.data.personal_data = false;
        ctx.data.lawful_basis = None;
        ctx.data.data_minimized = false;
        ctx.controls.encrypted_at_rest = false;
        assert!(failing(&ctx).is_empty());
    }

    #[test]
    fn consent_basis_without_consent() {
        let mut ctx = compliant_context();
        ctx.data.lawful_basis = Some(LawfulBasis::Consent);
        ctx.data.consent_obtained = false;
        assert_eq!(failing(&ctx), vec!["GDPR-002"]);
    }

    #[test_case(None, true; "no breach")]
    #[test_case(Some(72), true; "at deadline")]
    #[test_case(Some(73), false; "late")]
    fn breach_notification(hours: Option<u32>, ok: bool) {
        let mut ctx = compliant_context();
        ctx.governance.breach_notification_hours = hours;
        assert_eq!(failing(&ctx).is_empty(), ok);
    }

    #[test]
    fn unsafeguarded_transfer_is_critical() {
        let mut ctx = compliant_context();
        ctx.data.cross_border_transfer = true;
        assert_eq!(failing(&ctx), vec!["GDPR-006"]);
        let rule = RULES.iter().find(|r| r.id == "GDPR-006").unwrap();
        assert_eq!(rule.severity, Severity::Critical);
    }
}
