//! Normalized input for compliance evaluation.
//!
//! Callers map their records (customer files, system inventories,
//! transaction summaries) into an [`AssessmentContext`]. Rules only ever see
//! this structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_types::DataClassification;

use crate::{ComplianceError, ComplianceFramework, Result};

/// GDPR Article 6 lawful basis for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LawfulBasis {
    Consent,
    Contract,
    LegalObligation,
    VitalInterests,
    PublicTask,
    LegitimateInterests,
}

/// What data is processed and under which terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataProcessing {
    pub classification: DataClassification,
    pub personal_data: bool,
    pub health_data: bool,
    pub cardholder_data: bool,
    pub financial_reporting: bool,
    pub lawful_basis: Option<LawfulBasis>,
    pub consent_obtained: bool,
    pub data_minimized: bool,
    pub retention_days: Option<u32>,
    pub cross_border_transfer: bool,
    pub transfer_safeguards: bool,
}

/// Technical controls in place for the assessed system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityControls {
    pub encrypted_at_rest: bool,
    pub encrypted_in_transit: bool,
    pub mfa_enforced: bool,
    pub audit_logging: bool,
    pub access_review_age_days: Option<u32>,
    pub card_data_tokenized: bool,
    pub stores_card_verification_code: bool,
    pub vulnerability_scan_age_days: Option<u32>,
}

/// Organizational controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Governance {
    pub dpo_appointed: bool,
    pub dpia_completed: bool,
    /// Hours between discovery and notification of the most recent breach.
    /// `None` when no breach occurred.
    pub breach_notification_hours: Option<u32>,
    pub business_associate_agreement: bool,
    pub segregation_of_duties: bool,
    pub change_approval: bool,
    pub financial_controls_attested: bool,
    pub control_deficiencies_disclosed: bool,
}

/// Customer due diligence facts for AML/KYC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerProfile {
    pub identity_verified: bool,
    pub beneficial_owners_identified: bool,
    pub id_document_expires: Option<DateTime<Utc>>,
    pub politically_exposed: bool,
    pub high_risk_jurisdiction: bool,
    pub sanctions_screened: bool,
    pub sanctions_match: bool,
    pub cash_intensive: bool,
    pub annual_transaction_volume: f64,
    pub unusual_activity_flagged: bool,
    pub suspicious_activity_reported: bool,
    pub enhanced_due_diligence_completed: bool,
    pub senior_management_approval: bool,
    pub last_review: Option<DateTime<Utc>>,
}

/// Everything a compliance evaluation looks at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentContext {
    /// Frameworks to evaluate. Must be non-empty and free of duplicates.
    pub frameworks: Vec<ComplianceFramework>,
    /// Reference time for age and expiry checks.
    pub as_of: DateTime<Utc>,
    #[serde(default)]
    pub data: DataProcessing,
    #[serde(default)]
    pub controls: SecurityControls,
    #[serde(default)]
    pub governance: Governance,
    #[serde(default)]
    pub customer: Option<CustomerProfile>,
}

impl AssessmentContext {
    /// A context evaluating every framework at `as_of`.
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            frameworks: ComplianceFramework::all(),
            as_of,
            data: DataProcessing::default(),
            controls: SecurityControls::default(),
            governance: Governance::default(),
            customer: None,
        }
    }

    pub fn with_frameworks(
        mut self,
        frameworks: impl IntoIterator<Item = ComplianceFramework>,
    ) -> Self {
        self.frameworks = frameworks.into_iter().collect();
        self
    }

    pub fn in_scope(&self, framework: ComplianceFramework) -> bool {
        self.frameworks.contains(&framework)
    }

    /// Rejects contexts the rules cannot be evaluated against.
    pub fn validate(&self) -> Result<()> {
        if self.frameworks.is_empty() {
            return Err(ComplianceError::Validation(
                "at least one framework must be in scope".to_string(),
            ));
        }
        for (i, framework) in self.frameworks.iter().enumerate() {
            if self.frameworks[..i].contains(framework) {
                return Err(ComplianceError::Validation(format!(
                    "framework {framework} listed more than once"
                )));
            }
            if framework.requires_customer() && self.customer.is_none() {
                return Err(ComplianceError::Validation(format!(
                    "{framework} evaluation requires a customer profile"
                )));
            }
        }
        if self.data.retention_days == Some(0) {
            return Err(ComplianceError::Validation(
                "retention period must be positive when set".to_string(),
            ));
        }
        if let Some(customer) = &self.customer {
            let volume = customer.annual_transaction_volume;
            if !volume.is_finite() || volume < 0.0 {
                return Err(ComplianceError::Validation(format!(
                    "annual transaction volume must be a non-negative number, got {volume}"
                )));
            }
        }
        Ok(())
    }

    /// Days elapsed from `then` to `as_of`, zero if `then` is later.
    pub(crate) fn days_since(&self, then: DateTime<Utc>) -> i64 {
        (self.as_of - then).num_days().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_scope_is_invalid() {
        let ctx = AssessmentContext::new(as_of()).with_frameworks([]);
        assert!(matches!(ctx.validate(), Err(ComplianceError::Validation(_))));
    }

    #[test]
    fn duplicate_framework_is_invalid() {
        let ctx = AssessmentContext::new(as_of())
            .with_frameworks([ComplianceFramework::GDPR, ComplianceFramework::GDPR]);
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn aml_requires_customer() {
        let ctx = AssessmentContext::new(as_of()).with_frameworks([ComplianceFramework::AML]);
        let err = ctx.validate().unwrap_err();
        assert!(err.to_string().contains("customer profile"));
    }

    #[test]
    fn negative_volume_is_invalid() {
        let mut ctx = AssessmentContext::new(as_of()).with_frameworks([ComplianceFramework::KYC]);
        ctx.customer = Some(CustomerProfile {
            annual_transaction_volume: -1.0,
            ..Default::default()
        });
        assert!(ctx.validate().is_err());

        ctx.customer = Some(CustomerProfile {
            annual_transaction_volume: f64::NAN,
            ..Default::default()
        });
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn context_deserializes_with_defaults() {
        let json = r#"{"frameworks": ["GDPR"], "as_of": "2025-06-30T12:00:00Z"}"#;
        let ctx: AssessmentContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.frameworks, vec![ComplianceFramework::GDPR]);
        assert!(ctx.validate().is_ok());
        assert!(!ctx.data.personal_data);
    }
}
