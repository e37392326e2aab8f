//! Two-stage evaluation.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::catalog;
use crate::context::AssessmentContext;
use crate::result::{ComplianceResult, FrameworkResult};
use crate::rule::{DerivedRule, FrameworkCatalog};
use crate::{ComplianceFramework, Result};

/// Evaluates assessment contexts against the built-in catalogs.
///
/// The engine holds only `'static` rule tables, so it is cheap to clone and
/// safe to share across threads.
#[derive(Debug, Clone)]
pub struct ComplianceRuleEngine {
    catalogs: &'static [FrameworkCatalog],
    derived: &'static [DerivedRule],
}

impl Default for ComplianceRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplianceRuleEngine {
    pub fn new() -> Self {
        Self {
            catalogs: catalog::CATALOGS,
            derived: catalog::derived::RULES,
        }
    }

    fn catalog(&self, framework: ComplianceFramework) -> Option<&'static FrameworkCatalog> {
        self.catalogs.iter().find(|c| c.framework == framework)
    }

    /// Evaluates every in-scope framework.
    ///
    /// Returns [`crate::ComplianceError::Validation`] when the context is
    /// malformed. Rule failures are reported as findings, never as errors.
    pub fn evaluate(&self, ctx: &AssessmentContext) -> Result<ComplianceResult> {
        ctx.validate()?;

        // Stage 1: framework-local rules, one framework per task.
        let mut frameworks: Vec<FrameworkResult> = ctx
            .frameworks
            .par_iter()
            .filter_map(|&framework| self.catalog(framework))
            .map(|catalog| evaluate_framework(catalog, ctx))
            .collect();

        // Stage 2: derived rules read Stage 1 outcomes, which are frozen here.
        let stage_one = frameworks.clone();
        for rule in self.derived {
            let Some(source) = stage_one.iter().find(|f| f.framework == rule.source) else {
                continue;
            };
            let Some(target) = frameworks.iter_mut().find(|f| f.framework == rule.framework) else {
                continue;
            };
            if !(rule.check)(ctx, source) {
                debug!(rule = rule.id, source = %rule.source, "derived rule violated");
                target.findings.push(rule.finding());
            }
        }
        for framework in &mut frameworks {
            framework.compliant = framework.findings.is_empty();
            let derived_level = crate::rule::risk_from_findings(ctx, &framework.findings);
            framework.risk_level = framework.risk_level.max(derived_level);
        }

        let result = ComplianceResult::from_frameworks(ctx.as_of, frameworks);
        info!(
            frameworks = result.frameworks.len(),
            findings = result.findings().count(),
            score = result.score,
            compliant = result.overall_compliant,
            "compliance evaluation complete"
        );
        Ok(result)
    }
}

fn evaluate_framework(catalog: &FrameworkCatalog, ctx: &AssessmentContext) -> FrameworkResult {
    let findings: Vec<_> = catalog
        .rules
        .iter()
        .filter(|rule| !(rule.check)(ctx))
        .map(|rule| rule.finding(catalog.framework))
        .collect();
    let risk_level = (catalog.risk_profile)(ctx, &findings);
    debug!(
        framework = %catalog.framework,
        findings = findings.len(),
        risk = %risk_level,
        "framework evaluated"
    );
    FrameworkResult {
        framework: catalog.framework,
        compliant: findings.is_empty(),
        risk_level,
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{compliant_context, customer};
    use crate::{ComplianceError, CustomerProfile};
    use proptest::prelude::*;
    use warden_types::{RiskLevel, Severity};

    #[test]
    fn fully_compliant_context_scores_100() {
        let result = ComplianceRuleEngine::new()
            .evaluate(&compliant_context())
            .unwrap();
        let ids: Vec<_> = result.findings().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.is_empty(), "unexpected findings: {ids:?}");
        assert!(result.overall_compliant);
        assert_eq!(result.score, 100);
        assert_eq!(result.frameworks.len(), 6);
    }

    #[test]
    fn single_critical_finding_costs_30() {
        let mut ctx = compliant_context();
        ctx.controls.stores_card_verification_code = true;
        let result = ComplianceRuleEngine::new().evaluate(&ctx).unwrap();

        let findings: Vec<_> = result.findings().collect();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].framework, ComplianceFramework::PCIDSS);
        assert_eq!(result.score, 70);
        assert!(!result.overall_compliant);
        assert!(!result.framework(ComplianceFramework::PCIDSS).unwrap().compliant);
        assert!(result.framework(ComplianceFramework::GDPR).unwrap().compliant);
    }

    #[test]
    fn out_of_scope_frameworks_are_skipped() {
        let mut ctx = compliant_context().with_frameworks([ComplianceFramework::SOX]);
        ctx.controls.stores_card_verification_code = true;
        let result = ComplianceRuleEngine::new().evaluate(&ctx).unwrap();
        assert_eq!(result.frameworks.len(), 1);
        assert!(result.overall_compliant);
    }

    #[test]
    fn score_clamps_at_zero() {
        let mut ctx = crate::AssessmentContext::new(compliant_context().as_of);
        ctx.data.personal_data = true;
        ctx.data.health_data = true;
        ctx.data.cardholder_data = true;
        ctx.data.financial_reporting = true;
        ctx.controls.stores_card_verification_code = true;
        ctx.customer = Some(CustomerProfile {
            sanctions_match: true,
            politically_exposed: true,
            ..Default::default()
        });
        let result = ComplianceRuleEngine::new().evaluate(&ctx).unwrap();
        assert_eq!(result.score, 0);
        assert!(!result.overall_compliant);
        assert!(matches!(
            result.enforce(),
            Err(ComplianceError::Violation { score: 0, .. })
        ));
    }

    #[test]
    fn high_aml_risk_requires_enhanced_due_diligence() {
        let mut ctx = compliant_context();
        let profile = ctx.customer.as_mut().unwrap();
        profile.politically_exposed = true;
        profile.high_risk_jurisdiction = true;
        profile.enhanced_due_diligence_completed = false;

        let result = ComplianceRuleEngine::new().evaluate(&ctx).unwrap();
        let aml = result.framework(ComplianceFramework::AML).unwrap();
        assert_eq!(aml.risk_level, RiskLevel::High);
        let kyc = result.framework(ComplianceFramework::KYC).unwrap();
        assert!(kyc.findings.iter().any(|f| f.rule_id == "KYC-EDD-001"));
    }

    #[test]
    fn derived_rule_needs_source_in_scope() {
        let mut ctx = compliant_context()
            .with_frameworks([ComplianceFramework::KYC]);
        let profile = ctx.customer.as_mut().unwrap();
        profile.politically_exposed = true;
        profile.high_risk_jurisdiction = true;
        profile.enhanced_due_diligence_completed = false;

        let result = ComplianceRuleEngine::new().evaluate(&ctx).unwrap();
        assert!(result.findings().all(|f| f.rule_id != "KYC-EDD-001"));
    }

    #[test]
    fn invalid_context_is_rejected() {
        let mut ctx = compliant_context();
        ctx.customer = None;
        assert!(matches!(
            ComplianceRuleEngine::new().evaluate(&ctx),
            Err(ComplianceError::Validation(_))
        ));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let mut ctx = compliant_context();
        ctx.governance.dpo_appointed = false;
        ctx.controls.mfa_enforced = false;
        let engine = ComplianceRuleEngine::new();
        let a = engine.evaluate(&ctx).unwrap();
        let b = engine.evaluate(&ctx).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn score_matches_penalties(
            pep in any::<bool>(),
            jurisdiction in any::<bool>(),
            cash in any::<bool>(),
            sanctions in any::<bool>(),
            encrypted in any::<bool>(),
            mfa in any::<bool>(),
        ) {
            let mut ctx = compliant_context();
            ctx.controls.encrypted_at_rest = encrypted;
            ctx.controls.mfa_enforced = mfa;
            ctx.customer = Some(CustomerProfile {
                politically_exposed: pep,
                high_risk_jurisdiction: jurisdiction,
                cash_intensive: cash,
                sanctions_match: sanctions,
                ..customer()
            });
            let result = ComplianceRuleEngine::new().evaluate(&ctx).unwrap();
            let penalty: u32 = result.findings().map(|f| f.severity.penalty()).sum();
            prop_assert_eq!(result.score, 100u32.saturating_sub(penalty));
            prop_assert_eq!(result.overall_compliant, penalty == 0);
        }
    }
}
