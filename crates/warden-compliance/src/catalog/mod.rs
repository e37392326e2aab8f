//! Built-in rule catalogs, one module per framework.
//!
//! Rule identifiers are stable and appear in findings, audit entries and
//! reports. Never renumber an existing rule.

pub mod aml;
pub mod derived;
pub mod gdpr;
pub mod hipaa;
pub mod kyc;
pub mod pci_dss;
pub mod sox;

use crate::rule::FrameworkCatalog;

/// Every framework catalog the engine knows about.
pub static CATALOGS: &[FrameworkCatalog] = &[
    gdpr::CATALOG,
    hipaa::CATALOG,
    sox::CATALOG,
    pci_dss::CATALOG,
    aml::CATALOG,
    kyc::CATALOG,
];

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{TimeZone, Utc};
    use warden_types::DataClassification;

    use crate::context::{
        AssessmentContext, CustomerProfile, DataProcessing, Governance, LawfulBasis,
        SecurityControls,
    };

    /// A low-risk customer that passes every AML and KYC rule.
    pub fn customer() -> CustomerProfile {
        CustomerProfile {
            identity_verified: true,
            beneficial_owners_identified: true,
            id_document_expires: Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()),
            politically_exposed: false,
            high_risk_jurisdiction: false,
            sanctions_screened: true,
            sanctions_match: false,
            cash_intensive: false,
            annual_transaction_volume: 50_000.0,
            unusual_activity_flagged: false,
            suspicious_activity_reported: false,
            enhanced_due_diligence_completed: true,
            senior_management_approval: true,
            last_review: Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()),
        }
    }

    /// A context in scope for every framework with no findings.
    pub fn compliant_context() -> AssessmentContext {
        let mut ctx = AssessmentContext::new(Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap());
        ctx.data = DataProcessing {
            classification: DataClassification::Restricted,
            personal_data: true,
            health_data: true,
            cardholder_data: true,
            financial_reporting: true,
            lawful_basis: Some(LawfulBasis::Contract),
            consent_obtained: true,
            data_minimized: true,
            retention_days: Some(2555),
            cross_border_transfer: false,
            transfer_safeguards: false,
        };
        ctx.controls = SecurityControls {
            encrypted_at_rest: true,
            encrypted_in_transit: true,
            mfa_enforced: true,
            audit_logging: true,
            access_review_age_days: Some(30),
            card_data_tokenized: true,
            stores_card_verification_code: false,
            vulnerability_scan_age_days: Some(30),
        };
        ctx.governance = Governance {
            dpo_appointed: true,
            dpia_completed: true,
            breach_notification_hours: None,
            business_associate_agreement: true,
            segregation_of_duties: true,
            change_approval: true,
            financial_controls_attested: true,
            control_deficiencies_disclosed: true,
        };
        ctx.customer = Some(customer());
        ctx
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::ComplianceFramework;

    #[test]
    fn every_framework_has_a_catalog() {
        for framework in ComplianceFramework::all() {
            assert!(
                CATALOGS.iter().any(|c| c.framework == framework),
                "{framework} has no catalog"
            );
        }
    }

    #[test]
    fn rule_ids_are_unique() {
        let mut seen = HashSet::new();
        let local = CATALOGS.iter().flat_map(|c| c.rules.iter().map(|r| r.id));
        let derived = derived::RULES.iter().map(|r| r.id);
        for id in local.chain(derived) {
            assert!(seen.insert(id), "duplicate rule id {id}");
        }
    }
}
