use serde::{Deserialize, Serialize};
use warden_types::Severity;

use crate::{Result, RiskError};

/// Lowest likelihood or impact rating.
pub const MIN_RATING: u8 = 1;
/// Highest likelihood or impact rating.
pub const MAX_RATING: u8 = 5;

/// Broad grouping used for per-category breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
    Operational,
    Financial,
    Compliance,
    Cybersecurity,
    Reputational,
    Legal,
    ThirdParty,
}

/// A single identified risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub category: RiskCategory,
    pub severity: Severity,
    /// 1 (rare) to 5 (almost certain).
    pub likelihood: u8,
    /// 1 (negligible) to 5 (severe).
    pub impact: u8,
    #[serde(default)]
    pub description: String,
}

impl RiskFactor {
    /// Creates a factor, rejecting ratings outside `[1, 5]`.
    pub fn new(
        category: RiskCategory,
        severity: Severity,
        likelihood: u8,
        impact: u8,
    ) -> Result<Self> {
        let factor = Self {
            category,
            severity,
            likelihood,
            impact,
            description: String::new(),
        };
        factor.validate()?;
        Ok(factor)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Checks the ratings. Factors can bypass [`RiskFactor::new`] through
    /// deserialization, so scoring validates again.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("likelihood", self.likelihood), ("impact", self.impact)] {
            if !(MIN_RATING..=MAX_RATING).contains(&value) {
                return Err(RiskError::Validation(format!(
                    "{name} must be between {MIN_RATING} and {MAX_RATING}, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// `likelihood * impact * severity multiplier`, at most 100.
    pub fn contribution(&self) -> u32 {
        u32::from(self.likelihood) * u32::from(self.impact) * self.severity.multiplier()
    }
}
