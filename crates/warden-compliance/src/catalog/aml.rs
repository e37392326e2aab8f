//! Anti-money-laundering checks and the customer risk model.
//!
//! AML risk is the higher of two signals: the worst finding, and a points
//! score over customer risk indicators.
//!
//! | Indicator                         | Points |
//! |-----------------------------------|--------|
//! | Politically exposed person        | 2      |
//! | High-risk jurisdiction            | 2      |
//! | Cash-intensive business           | 1      |
//! | Annual volume above 100k / 1M     | 1 / 2  |
//! | Sanctions list match              | 4      |
//!
//! 0-1 points is LOW, 2-3 MEDIUM, 4-5 HIGH and 6 or more CRITICAL.

use warden_types::{RiskLevel, Severity};

use crate::ComplianceFramework;
use crate::context::{AssessmentContext, CustomerProfile};
use crate::result::ComplianceFinding;
use crate::rule::{ComplianceRule, FrameworkCatalog, risk_from_findings};

/// Maximum days between periodic customer reviews.
pub const REVIEW_INTERVAL_DAYS: i64 = 365;

const ELEVATED_VOLUME: f64 = 100_000.0;
const HIGH_VOLUME: f64 = 1_000_000.0;

fn customer_satisfies(ctx: &AssessmentContext, f: impl FnOnce(&CustomerProfile) -> bool) -> bool {
    ctx.customer.as_ref().is_none_or(f)
}

pub const RULES: &[ComplianceRule] = &[
    ComplianceRule {
        id: "AML-001",
        severity: Severity::Critical,
        description: "Customer not screened against sanctions lists",
        remediation: "Screen the customer and all beneficial owners before onboarding",
        check: |ctx| customer_satisfies(ctx, |c| c.sanctions_screened),
    },
    ComplianceRule {
        id: "AML-002",
        severity: Severity::Critical,
        description: "Customer matches a sanctions list",
        remediation: "Freeze the relationship and escalate to the compliance officer",
        check: |ctx| customer_satisfies(ctx, |c| !c.sanctions_match),
    },
    ComplianceRule {
        id: "AML-003",
        severity: Severity::High,
        description: "Unusual activity flagged without a suspicious activity report",
        remediation: "File a SAR within the regulatory deadline",
        check: |ctx| {
            customer_satisfies(ctx, |c| {
                !c.unusual_activity_flagged || c.suspicious_activity_reported
            })
        },
    },
    ComplianceRule {
        id: "AML-004",
        severity: Severity::Medium,
        description: "Politically exposed person onboarded without senior management approval",
        remediation: "Obtain and record senior management sign-off",
        check: |ctx| {
            customer_satisfies(ctx, |c| !c.politically_exposed || c.senior_management_approval)
        },
    },
    ComplianceRule {
        id: "AML-005",
        severity: Severity::Medium,
        description: "Customer not reviewed within the last year",
        remediation: "Schedule a periodic customer due diligence review",
        check: |ctx| {
            customer_satisfies(ctx, |c| {
                c.last_review
                    .is_some_and(|at| ctx.days_since(at) <= REVIEW_INTERVAL_DAYS)
            })
        },
    },
];

/// Indicator points for a customer.
pub fn indicator_points(customer: &CustomerProfile) -> u32 {
    let mut points = 0;
    if customer.politically_exposed {
        points += 2;
    }
    if customer.high_risk_jurisdiction {
        points += 2;
    }
    if customer.cash_intensive {
        points += 1;
    }
    if customer.annual_transaction_volume > HIGH_VOLUME {
        points += 2;
    } else if customer.annual_transaction_volume > ELEVATED_VOLUME {
        points += 1;
    }
    if customer.sanctions_match {
        points += 4;
    }
    points
}

fn level_for_points(points: u32) -> RiskLevel {
    match points {
        0..=1 => RiskLevel::Low,
        2..=3 => RiskLevel::Medium,
        4..=5 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

/// AML risk: the higher of the indicator score and the worst finding.
pub fn risk_profile(ctx: &AssessmentContext, findings: &[ComplianceFinding]) -> RiskLevel {
    let indicators = ctx
        .customer
        .as_ref()
        .map_or(RiskLevel::Low, |c| level_for_points(indicator_points(c)));
    indicators.max(risk_from_findings(ctx, findings))
}

pub const CATALOG: FrameworkCatalog = FrameworkCatalog {
    framework: ComplianceFramework::AML,
    rules: RULES,
    risk_profile,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{compliant_context, customer};
    use chrono::Duration;
    use test_case::test_case;

    #[test_case(0, RiskLevel::Low)]
    #[test_case(1, RiskLevel::Low)]
    #[test_case(2, RiskLevel::Medium)]
    #[test_case(3, RiskLevel::Medium)]
    #[test_case(4, RiskLevel::High)]
    #[test_case(5, RiskLevel::High)]
    #[test_case(6, RiskLevel::Critical)]
    #[test_case(11, RiskLevel::Critical)]
    fn point_bands(points: u32, expected: RiskLevel) {
        assert_eq!(level_for_points(points), expected);
    }

    #[test_case(50_000.0, 0)]
    #[test_case(100_001.0, 1)]
    #[test_case(1_000_001.0, 2)]
    fn volume_points(volume: f64, expected: u32) {
        let c = CustomerProfile {
            annual_transaction_volume: volume,
            ..customer()
        };
        assert_eq!(indicator_points(&c), expected);
    }

    #[test]
    fn sanctions_match_is_critical_by_findings() {
        let mut ctx = compliant_context();
        ctx.customer.as_mut().unwrap().sanctions_match = true;
        let findings: Vec<_> = RULES
            .iter()
            .filter(|r| !(r.check)(&ctx))
            .map(|r| r.finding(ComplianceFramework::AML))
            .collect();
        assert_eq!(findings.len(), 1);
        assert_eq!(risk_profile(&ctx, &findings), RiskLevel::Critical);
    }

    #[test]
    fn stale_review_fails() {
        let mut ctx = compliant_context();
        let as_of = ctx.as_of;
        ctx.customer.as_mut().unwrap().last_review = Some(as_of - Duration::days(366));
        let failing: Vec<_> = RULES.iter().filter(|r| !(r.check)(&ctx)).map(|r| r.id).collect();
        assert_eq!(failing, vec!["AML-005"]);
    }
}
