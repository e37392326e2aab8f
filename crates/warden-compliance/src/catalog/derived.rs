//! Cross-framework rules evaluated in Stage 2.

use warden_types::{RiskLevel, Severity};

use crate::ComplianceFramework;
use crate::rule::DerivedRule;

pub const RULES: &[DerivedRule] = &[
    DerivedRule {
        id: "KYC-EDD-001",
        framework: ComplianceFramework::KYC,
        source: ComplianceFramework::AML,
        severity: Severity::High,
        description: "High AML risk customer without enhanced due diligence",
        remediation: "Complete enhanced due diligence, including source of funds",
        check: |ctx, aml| {
            aml.risk_level < RiskLevel::High
                || ctx
                    .customer
                    .as_ref()
                    .is_none_or(|c| c.enhanced_due_diligence_completed)
        },
    },
    DerivedRule {
        id: "KYC-EDD-002",
        framework: ComplianceFramework::KYC,
        source: ComplianceFramework::AML,
        severity: Severity::Critical,
        description: "Critical AML risk customer retained without senior management approval",
        remediation: "Escalate the relationship to senior management for a retain or exit decision",
        check: |ctx, aml| {
            aml.risk_level < RiskLevel::Critical
                || ctx
                    .customer
                    .as_ref()
                    .is_none_or(|c| c.senior_management_approval)
        },
    },
    DerivedRule {
        id: "GDPR-X01",
        framework: ComplianceFramework::GDPR,
        source: ComplianceFramework::HIPAA,
        severity: Severity::High,
        description: "Critical health data gap without a data protection impact assessment \
                      (Art. 35)",
        remediation: "Carry out a DPIA covering the health data processing",
        check: |ctx, hipaa| {
            !hipaa.has_finding_at_least(Severity::Critical)
                || !ctx.data.personal_data
                || ctx.governance.dpia_completed
        },
    },
    DerivedRule {
        id: "SOX-X01",
        framework: ComplianceFramework::SOX,
        source: ComplianceFramework::PCIDSS,
        severity: Severity::Medium,
        description: "Material payment control gap not disclosed as a control deficiency",
        remediation: "Disclose the deficiency in the internal control assessment",
        check: |ctx, pci| {
            !pci.has_finding_at_least(Severity::High)
                || !ctx.data.financial_reporting
                || ctx.governance.control_deficiencies_disclosed
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::compliant_context;
    use crate::ComplianceRuleEngine;

    #[test]
    fn critical_aml_needs_senior_approval() {
        let mut ctx = compliant_context();
        let customer = ctx.customer.as_mut().unwrap();
        customer.politically_exposed = true;
        customer.high_risk_jurisdiction = true;
        customer.annual_transaction_volume = 2_000_000.0;
        customer.senior_management_approval = false;

        let result = ComplianceRuleEngine::new().evaluate(&ctx).unwrap();
        let aml = result.framework(ComplianceFramework::AML).unwrap();
        assert_eq!(aml.risk_level, RiskLevel::Critical);
        let kyc_ids: Vec<_> = result
            .framework(ComplianceFramework::KYC)
            .unwrap()
            .findings
            .iter()
            .map(|f| f.rule_id.as_str())
            .collect();
        assert_eq!(kyc_ids, vec!["KYC-EDD-002"]);
    }

    #[test]
    fn hipaa_gap_requires_dpia() {
        let mut ctx = compliant_context();
        ctx.controls.encrypted_at_rest = false;
        ctx.controls.card_data_tokenized = true;
        ctx.governance.dpia_completed = false;

        let result = ComplianceRuleEngine::new().evaluate(&ctx).unwrap();
        let gdpr = result.framework(ComplianceFramework::GDPR).unwrap();
        assert!(gdpr.findings.iter().any(|f| f.rule_id == "GDPR-X01"));
        assert!(gdpr.findings.iter().any(|f| f.rule_id == "GDPR-005"));
    }

    #[test]
    fn pci_gap_requires_sox_disclosure() {
        let mut ctx = compliant_context();
        ctx.controls.encrypted_in_transit = false;
        ctx.governance.control_deficiencies_disclosed = false;

        let result = ComplianceRuleEngine::new().evaluate(&ctx).unwrap();
        let sox = result.framework(ComplianceFramework::SOX).unwrap();
        assert_eq!(sox.findings.len(), 1);
        assert_eq!(sox.findings[0].rule_id, "SOX-X01");
    }
}
