//! Evaluation output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_types::{RiskLevel, Severity};

use crate::{ComplianceError, ComplianceFramework, Result};

/// Score every evaluation starts from.
pub const MAX_SCORE: u32 = 100;

/// A violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceFinding {
    pub framework: ComplianceFramework,
    pub rule_id: String,
    pub severity: Severity,
    pub description: String,
    pub remediation: String,
}

/// Outcome for one framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkResult {
    pub framework: ComplianceFramework,
    pub compliant: bool,
    pub risk_level: RiskLevel,
    pub findings: Vec<ComplianceFinding>,
}

impl FrameworkResult {
    pub fn has_finding_at_least(&self, severity: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= severity)
    }
}

/// Outcome of a full evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub evaluated_at: DateTime<Utc>,
    /// In-scope frameworks, in the order they were requested.
    pub frameworks: Vec<FrameworkResult>,
    /// True only if every in-scope framework has zero findings.
    pub overall_compliant: bool,
    /// `100 - sum(severity penalties)`, clamped to `[0, 100]`.
    pub score: u32,
}

impl ComplianceResult {
    pub(crate) fn from_frameworks(
        evaluated_at: DateTime<Utc>,
        frameworks: Vec<FrameworkResult>,
    ) -> Self {
        let penalty: u32 = frameworks
            .iter()
            .flat_map(|f| &f.findings)
            .map(|finding| finding.severity.penalty())
            .sum();
        Self {
            evaluated_at,
            overall_compliant: frameworks.iter().all(|f| f.compliant),
            score: MAX_SCORE.saturating_sub(penalty),
            frameworks,
        }
    }

    pub fn findings(&self) -> impl Iterator<Item = &ComplianceFinding> {
        self.frameworks.iter().flat_map(|f| f.findings.iter())
    }

    pub fn framework(&self, framework: ComplianceFramework) -> Option<&FrameworkResult> {
        self.frameworks.iter().find(|f| f.framework == framework)
    }

    /// Highest framework risk level.
    pub fn risk_level(&self) -> RiskLevel {
        self.frameworks
            .iter()
            .map(|f| f.risk_level)
            .max()
            .unwrap_or_default()
    }

    /// Converts a non-compliant result into [`ComplianceError::Violation`].
    pub fn enforce(self) -> Result<Self> {
        if self.overall_compliant {
            return Ok(self);
        }
        Err(ComplianceError::Violation {
            score: self.score,
            findings: self.findings().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn finding(severity: Severity) -> ComplianceFinding {
        ComplianceFinding {
            framework: ComplianceFramework::SOX,
            rule_id: "SOX-TEST".to_string(),
            severity,
            description: String::new(),
            remediation: String::new(),
        }
    }

    fn framework(findings: Vec<ComplianceFinding>) -> FrameworkResult {
        FrameworkResult {
            framework: ComplianceFramework::SOX,
            compliant: findings.is_empty(),
            risk_level: RiskLevel::Low,
            findings,
        }
    }

    #[test]
    fn clean_result_scores_100() {
        let result = ComplianceResult::from_frameworks(Utc::now(), vec![framework(vec![])]);
        assert!(result.overall_compliant);
        assert_eq!(result.score, 100);
        assert!(result.enforce().is_ok());
    }

    #[test]
    fn penalties_are_summed() {
        let result = ComplianceResult::from_frameworks(
            Utc::now(),
            vec![framework(vec![
                finding(Severity::Critical),
                finding(Severity::High),
                finding(Severity::Medium),
                finding(Severity::Low),
            ])],
        );
        assert_eq!(result.score, 100 - 30 - 20 - 10 - 5);
        assert!(!result.overall_compliant);
    }

    #[test]
    fn enforce_returns_findings() {
        let result = ComplianceResult::from_frameworks(
            Utc::now(),
            vec![framework(vec![finding(Severity::High)])],
        );
        match result.enforce() {
            Err(ComplianceError::Violation { score, findings }) => {
                assert_eq!(score, 80);
                assert_eq!(findings.len(), 1);
            }
            other => panic!("expected violation, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn score_stays_in_range(severities in proptest::collection::vec(0usize..4, 0..40)) {
            let findings = severities
                .into_iter()
                .map(|i| finding(Severity::all()[i]))
                .collect();
            let result = ComplianceResult::from_frameworks(Utc::now(), vec![framework(findings)]);
            prop_assert!(result.score <= 100);
            prop_assert_eq!(
                result.overall_compliant,
                result.score == 100 && result.findings().count() == 0
            );
        }
    }
}
