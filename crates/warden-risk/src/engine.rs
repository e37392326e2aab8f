use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_types::RiskLevel;

use crate::factor::{MAX_RATING, RiskCategory, RiskFactor};
use crate::trend::{MIN_TREND_POINTS, PeriodScore, TrendDirection, TrendPrediction};
use crate::{Result, RiskError};

/// Largest possible contribution of a single factor (5 * 5 * CRITICAL).
const MAX_CONTRIBUTION: u32 = (MAX_RATING as u32) * (MAX_RATING as u32) * 4;

/// Scores, in points per period, below which a trend counts as stable.
const STABLE_SLOPE: f64 = 0.5;

/// A score in `[0, 100]` with its band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    pub score: u32,
    pub level: RiskLevel,
}

impl RiskScore {
    pub fn from_score(score: u32) -> Self {
        Self {
            score,
            level: RiskLevel::from_score(score),
        }
    }
}

/// Risk remaining after mitigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualRisk {
    pub initial: u32,
    pub residual: u32,
    /// Percentage reduction from `initial`; zero when `initial` is zero.
    pub reduction_percent: u32,
    pub level: RiskLevel,
}

/// Score of the factors in one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: RiskCategory,
    pub factor_count: usize,
    pub score: RiskScore,
}

/// Stateless risk calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScoringEngine;

impl RiskScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Mean factor contribution as a percentage of the maximum.
    ///
    /// An empty slice scores `{0, LOW}`.
    pub fn calculate_risk_score(&self, factors: &[RiskFactor]) -> Result<RiskScore> {
        if factors.is_empty() {
            return Ok(RiskScore::default());
        }
        let mut total: u64 = 0;
        for factor in factors {
            factor.validate()?;
            total += u64::from(factor.contribution());
        }
        let max = u64::from(MAX_CONTRIBUTION) * factors.len() as u64;
        let score = (100.0 * total as f64 / max as f64).round() as u32;
        debug!(factors = factors.len(), score, "risk score calculated");
        Ok(RiskScore::from_score(score))
    }

    /// `round(initial * (1 - effectiveness))`.
    ///
    /// `initial` must be a valid score and `effectiveness` a fraction in
    /// `[0, 1]`.
    pub fn calculate_residual_risk(
        &self,
        initial: u32,
        effectiveness: f64,
    ) -> Result<ResidualRisk> {
        if initial > 100 {
            return Err(RiskError::Validation(format!(
                "initial score must be at most 100, got {initial}"
            )));
        }
        if !(0.0..=1.0).contains(&effectiveness) {
            return Err(RiskError::Validation(format!(
                "mitigation effectiveness must be in [0, 1], got {effectiveness}"
            )));
        }
        let residual = (f64::from(initial) * (1.0 - effectiveness)).round() as u32;
        let reduction_percent = if initial == 0 {
            0
        } else {
            (100.0 * f64::from(initial - residual) / f64::from(initial)).round() as u32
        };
        Ok(ResidualRisk {
            initial,
            residual,
            reduction_percent,
            level: RiskLevel::from_score(residual),
        })
    }

    /// Scores per category, ordered by category.
    pub fn category_breakdown(&self, factors: &[RiskFactor]) -> Result<Vec<CategoryBreakdown>> {
        let mut groups: BTreeMap<RiskCategory, Vec<RiskFactor>> = BTreeMap::new();
        for factor in factors {
            groups.entry(factor.category).or_default().push(factor.clone());
        }
        groups
            .into_iter()
            .map(|(category, group)| {
                Ok(CategoryBreakdown {
                    category,
                    factor_count: group.len(),
                    score: self.calculate_risk_score(&group)?,
                })
            })
            .collect()
    }

    /// Least-squares trend over period averages.
    ///
    /// Each period is placed at its calendar position, so a gap of empty
    /// periods stretches the x axis instead of being closed up. Periods with
    /// a non-finite average are skipped. Fewer than [`MIN_TREND_POINTS`]
    /// usable periods yields [`TrendPrediction::InsufficientData`].
    /// Confidence is the coefficient of determination as a percentage.
    pub fn predict_trend(&self, periods: &[PeriodScore]) -> TrendPrediction {
        let Some(first) = periods.iter().map(|p| p.period_start).min() else {
            return TrendPrediction::InsufficientData { points: 0 };
        };
        let points: Vec<(f64, f64)> = periods
            .iter()
            .filter(|p| p.average.is_finite())
            .map(|p| {
                let x = p.granularity.periods_between(first, p.period_start) as f64;
                (x, p.average)
            })
            .collect();
        if points.len() < MIN_TREND_POINTS {
            return TrendPrediction::InsufficientData {
                points: points.len(),
            };
        }

        let n = points.len() as f64;
        let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for (x, y) in &points {
            let dx = x - mean_x;
            sxy += dx * (y - mean_y);
            sxx += dx * dx;
        }
        // Every point in the same period.
        if sxx == 0.0 {
            return TrendPrediction::InsufficientData { points: 1 };
        }
        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (x, y) in &points {
            let fitted = intercept + slope * x;
            ss_res += (y - fitted).powi(2);
            ss_tot += (y - mean_y).powi(2);
        }
        // A flat series is fitted exactly by a flat line.
        let r_squared = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };
        let last_x = points.iter().map(|(x, _)| *x).fold(f64::MIN, f64::max);

        let direction = if slope.abs() < STABLE_SLOPE {
            TrendDirection::Stable
        } else if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        let next = (intercept + slope * (last_x + 1.0)).round().clamp(0.0, 100.0) as u32;

        TrendPrediction::Trend {
            direction,
            slope,
            confidence: (r_squared.clamp(0.0, 1.0) * 100.0).round() as u32,
            next_period_score: next,
        }
    }
}
