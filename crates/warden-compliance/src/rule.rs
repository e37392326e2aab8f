//! Rule definitions.
//!
//! Rules are plain data: an identifier, a severity, human-readable text and
//! a predicate that returns `true` when the context satisfies the rule.
//! Rules that do not apply to a context (HIPAA rules for a system without
//! health data) are satisfied.

use warden_types::{RiskLevel, Severity};

use crate::context::AssessmentContext;
use crate::result::{ComplianceFinding, FrameworkResult};
use crate::ComplianceFramework;

/// A framework-local rule, evaluated in Stage 1.
#[derive(Debug, Clone, Copy)]
pub struct ComplianceRule {
    pub id: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub remediation: &'static str,
    pub check: fn(&AssessmentContext) -> bool,
}

impl ComplianceRule {
    pub(crate) fn finding(&self, framework: ComplianceFramework) -> ComplianceFinding {
        ComplianceFinding {
            framework,
            rule_id: self.id.to_string(),
            severity: self.severity,
            description: self.description.to_string(),
            remediation: self.remediation.to_string(),
        }
    }
}

/// A rule attached to `framework` that reads the Stage 1 result of `source`.
///
/// Derived rules run only when both frameworks are in scope.
#[derive(Debug, Clone, Copy)]
pub struct DerivedRule {
    pub id: &'static str,
    pub framework: ComplianceFramework,
    pub source: ComplianceFramework,
    pub severity: Severity,
    pub description: &'static str,
    pub remediation: &'static str,
    pub check: fn(&AssessmentContext, &FrameworkResult) -> bool,
}

impl DerivedRule {
    pub(crate) fn finding(&self) -> ComplianceFinding {
        ComplianceFinding {
            framework: self.framework,
            rule_id: self.id.to_string(),
            severity: self.severity,
            description: self.description.to_string(),
            remediation: self.remediation.to_string(),
        }
    }
}

/// All Stage 1 rules of one framework plus its risk model.
#[derive(Debug, Clone, Copy)]
pub struct FrameworkCatalog {
    pub framework: ComplianceFramework,
    pub rules: &'static [ComplianceRule],
    /// Computes the framework risk level from the context and Stage 1 findings.
    pub risk_profile: fn(&AssessmentContext, &[ComplianceFinding]) -> RiskLevel,
}

/// Risk level implied by the worst finding; LOW when there are none.
pub fn risk_from_findings(_ctx: &AssessmentContext, findings: &[ComplianceFinding]) -> RiskLevel {
    findings
        .iter()
        .map(|finding| RiskLevel::from(finding.severity))
        .max()
        .unwrap_or(RiskLevel::Low)
}
