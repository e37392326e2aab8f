//! Persistence boundary for risk assessments and compliance results.

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use warden_compliance::ComplianceResult;
use warden_risk::RiskAssessment;
use warden_types::{PrincipalId, TenantId};

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The stored copy is newer than the one being saved.
    #[error("stale write for {id}: stored version {stored}, attempted {attempted}")]
    StaleVersion { id: Uuid, stored: u32, attempted: u32 },

    #[error("record {0} already exists")]
    Duplicate(Uuid),

    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// A persisted compliance evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub id: Uuid,
    pub tenant_id: TenantId,
    /// What was evaluated, e.g. a client or engagement reference.
    pub subject: String,
    pub evaluated_by: PrincipalId,
    pub result: ComplianceResult,
}

impl ComplianceRecord {
    pub fn new(
        tenant_id: TenantId,
        subject: impl Into<String>,
        evaluated_by: PrincipalId,
        result: ComplianceResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            subject: subject.into(),
            evaluated_by,
            result,
        }
    }

    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.result.evaluated_at
    }
}

/// Storage for assessments and compliance results, partitioned by tenant.
///
/// Reads never return another tenant's records. Saving an assessment whose
/// version is older than the stored one fails with
/// [`RepositoryError::StaleVersion`].
pub trait AssessmentRepository: Send + Sync + 'static {
    fn save_assessment(
        &self,
        assessment: RiskAssessment,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn load_assessment(
        &self,
        tenant_id: &TenantId,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<RiskAssessment>, RepositoryError>> + Send;

    /// All assessments of the tenant, oldest first.
    fn list_assessments(
        &self,
        tenant_id: &TenantId,
    ) -> impl Future<Output = Result<Vec<RiskAssessment>, RepositoryError>> + Send;

    /// Returns whether a record was removed.
    fn delete_assessment(
        &self,
        tenant_id: &TenantId,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn save_compliance(
        &self,
        record: ComplianceRecord,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Most recent evaluation of the tenant by `evaluated_at`.
    fn latest_compliance(
        &self,
        tenant_id: &TenantId,
    ) -> impl Future<Output = Result<Option<ComplianceRecord>, RepositoryError>> + Send;

    /// All evaluations of the tenant, oldest first.
    fn list_compliance(
        &self,
        tenant_id: &TenantId,
    ) -> impl Future<Output = Result<Vec<ComplianceRecord>, RepositoryError>> + Send;
}

#[derive(Debug, Default)]
struct TenantRecords {
    assessments: Vec<RiskAssessment>,
    compliance: Vec<ComplianceRecord>,
}

/// In-process repository.
#[derive(Debug, Default)]
pub struct InMemoryAssessmentRepository {
    tenants: RwLock<HashMap<TenantId, TenantRecords>>,
}

impl InMemoryAssessmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(
        &self,
        tenant_id: &TenantId,
        f: impl FnOnce(&TenantRecords) -> T,
    ) -> Result<T, RepositoryError>
    where
        T: Default,
    {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".to_string()))?;
        Ok(tenants.get(tenant_id).map(f).unwrap_or_default())
    }

    fn write<T>(
        &self,
        tenant_id: &TenantId,
        f: impl FnOnce(&mut TenantRecords) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".to_string()))?;
        f(tenants.entry(tenant_id.clone()).or_default())
    }
}

impl AssessmentRepository for InMemoryAssessmentRepository {
    async fn save_assessment(&self, assessment: RiskAssessment) -> Result<(), RepositoryError> {
        let tenant_id = assessment.tenant_id.clone();
        self.write(&tenant_id, |records| {
            match records
                .assessments
                .iter_mut()
                .find(|stored| stored.id == assessment.id)
            {
                Some(stored) if stored.version() > assessment.version() => {
                    Err(RepositoryError::StaleVersion {
                        id: assessment.id,
                        stored: stored.version(),
                        attempted: assessment.version(),
                    })
                }
                Some(stored) => {
                    *stored = assessment;
                    Ok(())
                }
                None => {
                    records.assessments.push(assessment);
                    Ok(())
                }
            }
        })
    }

    async fn load_assessment(
        &self,
        tenant_id: &TenantId,
        id: Uuid,
    ) -> Result<Option<RiskAssessment>, RepositoryError> {
        self.read(tenant_id, |records| {
            records.assessments.iter().find(|a| a.id == id).cloned()
        })
    }

    async fn list_assessments(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<RiskAssessment>, RepositoryError> {
        self.read(tenant_id, |records| records.assessments.clone())
    }

    async fn delete_assessment(
        &self,
        tenant_id: &TenantId,
        id: Uuid,
    ) -> Result<bool, RepositoryError> {
        self.write(tenant_id, |records| {
            let before = records.assessments.len();
            records.assessments.retain(|a| a.id != id);
            Ok(records.assessments.len() != before)
        })
    }

    async fn save_compliance(&self, record: ComplianceRecord) -> Result<(), RepositoryError> {
        let tenant_id = record.tenant_id.clone();
        self.write(&tenant_id, |records| {
            if records.compliance.iter().any(|stored| stored.id == record.id) {
                return Err(RepositoryError::Duplicate(record.id));
            }
            records.compliance.push(record);
            Ok(())
        })
    }

    async fn latest_compliance(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<ComplianceRecord>, RepositoryError> {
        self.read(tenant_id, |records| {
            records
                .compliance
                .iter()
                .max_by_key(|record| record.evaluated_at())
                .cloned()
        })
    }

    async fn list_compliance(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<ComplianceRecord>, RepositoryError> {
        self.read(tenant_id, |records| records.compliance.clone())
    }
}
