//! # warden-risk: risk scoring
//!
//! Weighted scoring of [`RiskFactor`]s, residual risk after mitigation, and
//! trend estimation over period-aggregated score history.
//!
//! # Scoring
//!
//! Each factor contributes `likelihood * impact * multiplier`, where the
//! multiplier is 1-4 by severity. The maximum contribution is `5 * 5 * 4 =
//! 100`, so the score is the mean contribution as a percentage:
//!
//! ```text
//! score = round(100 * sum(contribution) / (100 * count))
//! ```
//!
//! | Score   | Level    |
//! |---------|----------|
//! | 0-39    | LOW      |
//! | 40-59   | MEDIUM   |
//! | 60-79   | HIGH     |
//! | 80-100  | CRITICAL |
//!
//! # Assessments
//!
//! A [`RiskAssessment`] moves through
//!
//! ```text
//! Draft -> Active <-> UnderReview
//!            \            \
//!             +-> Archived <+
//! ```
//!
//! and appends a version snapshot on every mutation.

use thiserror::Error;

mod assessment;
mod engine;
mod factor;
mod trend;

pub use assessment::{AssessmentStatus, AssessmentVersion, Mitigation, RiskAssessment};
pub use engine::{CategoryBreakdown, ResidualRisk, RiskScore, RiskScoringEngine};
pub use factor::{MAX_RATING, MIN_RATING, RiskCategory, RiskFactor};
pub use trend::{
    Granularity, MIN_TREND_POINTS, PeriodScore, RiskSample, TrendDirection, TrendPrediction,
    aggregate,
};

/// Result type for risk operations
pub type Result<T> = std::result::Result<T, RiskError>;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Invalid risk input: {0}")]
    Validation(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
}
