//! Risk assessment records with version history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use warden_types::{PrincipalId, TenantId};

use crate::engine::{ResidualRisk, RiskScore, RiskScoringEngine};
use crate::factor::RiskFactor;
use crate::{Result, RiskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentStatus {
    Draft,
    Active,
    UnderReview,
    Archived,
}

/// A control that reduces risk once implemented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mitigation {
    pub id: Uuid,
    pub description: String,
    /// Fraction of risk removed, in `[0, 1]`.
    pub effectiveness: f64,
    pub implemented: bool,
}

impl Mitigation {
    pub fn new(description: impl Into<String>, effectiveness: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&effectiveness) {
            return Err(RiskError::Validation(format!(
                "mitigation effectiveness must be in [0, 1], got {effectiveness}"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            description: description.into(),
            effectiveness,
            implemented: false,
        })
    }
}

/// Snapshot of an assessment taken after a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentVersion {
    pub version: u32,
    pub status: AssessmentStatus,
    pub factors: Vec<RiskFactor>,
    pub mitigations: Vec<Mitigation>,
    pub score: RiskScore,
    pub residual: ResidualRisk,
    pub changed_by: PrincipalId,
    pub change: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub title: String,
    status: AssessmentStatus,
    factors: Vec<RiskFactor>,
    mitigations: Vec<Mitigation>,
    score: RiskScore,
    residual: ResidualRisk,
    history: Vec<AssessmentVersion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// Creates a draft with no factors and records version 1.
    pub fn new(
        tenant_id: TenantId,
        title: impl Into<String>,
        author: &PrincipalId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut assessment = Self {
            id: Uuid::new_v4(),
            tenant_id,
            title: title.into(),
            status: AssessmentStatus::Draft,
            factors: Vec::new(),
            mitigations: Vec::new(),
            score: RiskScore::default(),
            residual: ResidualRisk {
                initial: 0,
                residual: 0,
                reduction_percent: 0,
                level: RiskScore::default().level,
            },
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        assessment.snapshot(author, "created", now);
        assessment
    }

    pub fn status(&self) -> AssessmentStatus {
        self.status
    }

    pub fn factors(&self) -> &[RiskFactor] {
        &self.factors
    }

    pub fn mitigations(&self) -> &[Mitigation] {
        &self.mitigations
    }

    pub fn score(&self) -> RiskScore {
        self.score
    }

    pub fn residual(&self) -> ResidualRisk {
        self.residual
    }

    /// Every version, oldest first.
    pub fn history(&self) -> &[AssessmentVersion] {
        &self.history
    }

    pub fn version(&self) -> u32 {
        self.history.len() as u32
    }

    pub fn add_factor(
        &mut self,
        factor: RiskFactor,
        by: &PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_editable("add factor")?;
        factor.validate()?;
        self.factors.push(factor);
        self.recompute()?;
        self.snapshot(by, "factor added", now);
        Ok(())
    }

    pub fn remove_factor(
        &mut self,
        index: usize,
        by: &PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<RiskFactor> {
        self.ensure_editable("remove factor")?;
        if index >= self.factors.len() {
            return Err(RiskError::Validation(format!(
                "factor index {index} out of range ({} factors)",
                self.factors.len()
            )));
        }
        let removed = self.factors.remove(index);
        self.recompute()?;
        self.snapshot(by, "factor removed", now);
        Ok(removed)
    }

    pub fn add_mitigation(
        &mut self,
        mitigation: Mitigation,
        by: &PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        self.ensure_editable("add mitigation")?;
        let id = mitigation.id;
        self.mitigations.push(mitigation);
        self.recompute()?;
        self.snapshot(by, "mitigation added", now);
        Ok(id)
    }

    /// Marks a mitigation implemented; only implemented mitigations reduce
    /// residual risk.
    pub fn implement_mitigation(
        &mut self,
        id: Uuid,
        by: &PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_editable("implement mitigation")?;
        let mitigation = self
            .mitigations
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| RiskError::Validation(format!("unknown mitigation {id}")))?;
        mitigation.implemented = true;
        self.recompute()?;
        self.snapshot(by, "mitigation implemented", now);
        Ok(())
    }

    /// Draft to Active. Requires at least one factor.
    pub fn activate(&mut self, by: &PrincipalId, now: DateTime<Utc>) -> Result<()> {
        if self.status != AssessmentStatus::Draft {
            return Err(self.invalid("activate", "Draft"));
        }
        if self.factors.is_empty() {
            return Err(RiskError::Validation(
                "cannot activate an assessment without risk factors".to_string(),
            ));
        }
        self.transition(AssessmentStatus::Active, by, now);
        Ok(())
    }

    /// Active to UnderReview.
    pub fn submit_for_review(&mut self, by: &PrincipalId, now: DateTime<Utc>) -> Result<()> {
        if self.status != AssessmentStatus::Active {
            return Err(self.invalid("submit for review", "Active"));
        }
        self.transition(AssessmentStatus::UnderReview, by, now);
        Ok(())
    }

    /// UnderReview back to Active.
    pub fn complete_review(&mut self, by: &PrincipalId, now: DateTime<Utc>) -> Result<()> {
        if self.status != AssessmentStatus::UnderReview {
            return Err(self.invalid("complete review", "UnderReview"));
        }
        self.transition(AssessmentStatus::Active, by, now);
        Ok(())
    }

    /// Active or UnderReview to Archived. Archived assessments are read-only.
    pub fn archive(&mut self, by: &PrincipalId, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            AssessmentStatus::Active | AssessmentStatus::UnderReview => {}
            _ => return Err(self.invalid("archive", "Active or UnderReview")),
        }
        self.transition(AssessmentStatus::Archived, by, now);
        Ok(())
    }

    fn ensure_editable(&self, operation: &str) -> Result<()> {
        if self.status == AssessmentStatus::Archived {
            return Err(self.invalid(operation, "a non-archived status"));
        }
        Ok(())
    }

    fn invalid(&self, operation: &str, expected: &str) -> RiskError {
        let status = self.status;
        RiskError::InvalidTransition(format!(
            "cannot {operation} from {status:?}, expected {expected}"
        ))
    }

    fn transition(&mut self, to: AssessmentStatus, by: &PrincipalId, now: DateTime<Utc>) {
        info!(assessment = %self.id, from = ?self.status, to = ?to, "assessment status changed");
        self.status = to;
        self.snapshot(by, "status changed", now);
    }

    fn recompute(&mut self) -> Result<()> {
        let engine = RiskScoringEngine::new();
        self.score = engine.calculate_risk_score(&self.factors)?;
        self.residual = engine.calculate_residual_risk(self.score.score, self.effectiveness())?;
        Ok(())
    }

    /// Combined effectiveness of implemented mitigations, `1 - prod(1 - e)`.
    fn effectiveness(&self) -> f64 {
        let remaining: f64 = self
            .mitigations
            .iter()
            .filter(|m| m.implemented)
            .map(|m| 1.0 - m.effectiveness)
            .product();
        (1.0 - remaining).clamp(0.0, 1.0)
    }

    fn snapshot(&mut self, by: &PrincipalId, change: &str, now: DateTime<Utc>) {
        self.updated_at = now;
        self.history.push(AssessmentVersion {
            version: self.history.len() as u32 + 1,
            status: self.status,
            factors: self.factors.clone(),
            mitigations: self.mitigations.clone(),
            score: self.score,
            residual: self.residual,
            changed_by: by.clone(),
            change: change.to_string(),
            recorded_at: now,
        });
    }
}
