//! Period aggregation and trend output types.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Minimum number of periods for a directional trend.
pub const MIN_TREND_POINTS: usize = 3;

/// A timestamped score, e.g. one assessment snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSample {
    pub at: DateTime<Utc>,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// ISO weeks starting Monday.
    Weekly,
    /// Calendar months.
    Monthly,
}

impl Granularity {
    fn period_start(self, date: NaiveDate) -> NaiveDate {
        let offset = match self {
            Granularity::Weekly => date.weekday().num_days_from_monday(),
            Granularity::Monthly => date.day0(),
        };
        date - Duration::days(i64::from(offset))
    }

    /// Whole periods from the period holding `from` to the one holding `to`.
    /// Negative when `to` is earlier.
    pub fn periods_between(self, from: NaiveDate, to: NaiveDate) -> i64 {
        match self {
            Granularity::Weekly => {
                (self.period_start(to) - self.period_start(from)).num_days() / 7
            }
            Granularity::Monthly => {
                let index = |d: NaiveDate| i64::from(d.year()) * 12 + i64::from(d.month0());
                index(to) - index(from)
            }
        }
    }
}

/// Mean score of the samples falling in one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodScore {
    pub period_start: NaiveDate,
    pub granularity: Granularity,
    pub average: f64,
    pub samples: usize,
}

/// Groups samples into periods, in chronological order. Empty periods are
/// omitted.
pub fn aggregate(samples: &[RiskSample], granularity: Granularity) -> Vec<PeriodScore> {
    let mut buckets: BTreeMap<NaiveDate, (u64, usize)> = BTreeMap::new();
    for sample in samples {
        let start = granularity.period_start(sample.at.date_naive());
        let bucket = buckets.entry(start).or_default();
        bucket.0 += u64::from(sample.score);
        bucket.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(period_start, (sum, count))| PeriodScore {
            period_start,
            granularity,
            average: sum as f64 / count as f64,
            samples: count,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

/// Result of [`crate::RiskScoringEngine::predict_trend`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrendPrediction {
    /// Too few periods to fit a line. Carries no direction.
    InsufficientData { points: usize },
    Trend {
        direction: TrendDirection,
        /// Score change per period.
        slope: f64,
        /// Goodness of fit, 0-100.
        confidence: u32,
        /// Extrapolated score for the next period, clamped to `[0, 100]`.
        next_period_score: u32,
    },
}

impl TrendPrediction {
    pub fn direction(&self) -> Option<TrendDirection> {
        match self {
            TrendPrediction::InsufficientData { .. } => None,
            TrendPrediction::Trend { direction, .. } => Some(*direction),
        }
    }

    pub fn is_sufficient(&self) -> bool {
        matches!(self, TrendPrediction::Trend { .. })
    }
}
