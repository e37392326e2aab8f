//! Request environment attributes.
//!
//! Environment attributes are computed by the server at request time, never
//! taken from the client. Risk level and compliance posture come from the
//! latest risk assessment and compliance evaluation for the tenant.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use warden_types::{Purpose, RiskLevel};

/// Business hours window in UTC, weekdays only. `end_hour` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

impl BusinessHours {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let is_weekday = !matches!(ts.weekday(), Weekday::Sat | Weekday::Sun);
        is_weekday && (self.start_hour..self.end_hour).contains(&ts.hour())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentAttributes {
    pub timestamp: DateTime<Utc>,
    pub is_business_hours: bool,
    /// Current risk level of the tenant or engagement, if assessed.
    pub risk_level: Option<RiskLevel>,
    /// `Some(false)` when the latest compliance evaluation failed.
    pub compliant: Option<bool>,
    /// Purpose declared for this request.
    pub purpose: Option<Purpose>,
}

impl EnvironmentAttributes {
    /// Attributes at `ts` with the default 09:00-17:00 UTC business hours.
    pub fn from_timestamp(ts: DateTime<Utc>) -> Self {
        Self::with_hours(ts, BusinessHours::default())
    }

    pub fn with_hours(ts: DateTime<Utc>, hours: BusinessHours) -> Self {
        Self {
            timestamp: ts,
            is_business_hours: hours.contains(ts),
            risk_level: None,
            compliant: None,
            purpose: None,
        }
    }

    pub fn with_risk_level(mut self, level: RiskLevel) -> Self {
        self.risk_level = Some(level);
        self
    }

    pub fn with_compliance_posture(mut self, compliant: bool) -> Self {
        self.compliant = Some(compliant);
        self
    }

    pub fn with_purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = Some(purpose);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    // 2025-01-08 is a Wednesday, 2025-01-11 a Saturday.
    #[test_case(2025, 1, 8, 10, true ; "weekday morning")]
    #[test_case(2025, 1, 8, 9, true ; "start is inclusive")]
    #[test_case(2025, 1, 8, 17, false ; "end is exclusive")]
    #[test_case(2025, 1, 8, 3, false ; "night")]
    #[test_case(2025, 1, 11, 10, false ; "weekend")]
    fn business_hours(y: i32, m: u32, d: u32, h: u32, expected: bool) {
        let ts = Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap();
        assert_eq!(EnvironmentAttributes::from_timestamp(ts).is_business_hours, expected);
    }

    #[test]
    fn custom_hours() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 8, 7, 30, 0).unwrap();
        let hours = BusinessHours { start_hour: 7, end_hour: 19 };
        assert!(EnvironmentAttributes::with_hours(ts, hours).is_business_hours);
    }
}
