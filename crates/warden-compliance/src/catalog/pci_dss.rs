//! PCI DSS v4 checks for cardholder data environments.

use warden_types::Severity;

use crate::ComplianceFramework;
use crate::rule::{ComplianceRule, FrameworkCatalog, risk_from_findings};

/// Quarterly vulnerability scanning, requirement 11.3.
pub const MAX_SCAN_AGE_DAYS: u32 = 90;

pub const RULES: &[ComplianceRule] = &[
    ComplianceRule {
        id: "PCI-001",
        severity: Severity::Critical,
        description: "Card verification code stored after authorization (Req. 3.3.1.2)",
        remediation: "Purge stored CVV/CVC values and stop persisting them",
        check: |ctx| !ctx.controls.stores_card_verification_code,
    },
    ComplianceRule {
        id: "PCI-002",
        severity: Severity::High,
        description: "Stored PAN is neither tokenized nor encrypted (Req. 3.5)",
        remediation: "Tokenize card numbers or encrypt them at rest",
        check: |ctx| {
            !ctx.data.cardholder_data
                || ctx.controls.card_data_tokenized
                || ctx.controls.encrypted_at_rest
        },
    },
    ComplianceRule {
        id: "PCI-003",
        severity: Severity::High,
        description: "Cardholder data sent over unencrypted channels (Req. 4.2)",
        remediation: "Use strong cryptography on every transmission of PAN",
        check: |ctx| !ctx.data.cardholder_data || ctx.controls.encrypted_in_transit,
    },
    ComplianceRule {
        id: "PCI-004",
        severity: Severity::High,
        description: "MFA not enforced for access to the cardholder data environment (Req. 8.4)",
        remediation: "Require multi-factor authentication for all CDE access",
        check: |ctx| !ctx.data.cardholder_data || ctx.controls.mfa_enforced,
    },
    ComplianceRule {
        id: "PCI-005",
        severity: Severity::Medium,
        description: "No vulnerability scan in the last quarter (Req. 11.3)",
        remediation: "Run and remediate quarterly internal and external scans",
        check: |ctx| {
            !ctx.data.cardholder_data
                || ctx
                    .controls
                    .vulnerability_scan_age_days
                    .is_some_and(|days| days <= MAX_SCAN_AGE_DAYS)
        },
    },
    ComplianceRule {
        id: "PCI-006",
        severity: Severity::Medium,
        description: "Access to cardholder data is not logged (Req. 10.2)",
        remediation: "Log all individual access to cardholder data",
        check: |ctx| !ctx.data.cardholder_data || ctx.controls.audit_logging,
    },
];

pub const CATALOG: FrameworkCatalog = FrameworkCatalog {
    framework: ComplianceFramework::PCIDSS,
    rules: RULES,
    risk_profile: risk_from_findings,
};
