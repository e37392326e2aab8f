//! The Warden service container.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use warden_ability::{
    AbilityEngine, BusinessHours, Decision, EnvironmentAttributes, SignatureThresholds,
    TENANT_CONTEXT_MISSING,
};
use warden_audit::{
    AlertSink, AuditAction, AuditEntry, AuditEvent, AuditLedger, AuditQuery, AuditStore,
    ChainVerification, InMemoryAuditStore, LedgerConfig, RetryPolicy, RetryWorker, SecurityAlert,
    TracingAlertSink,
};
use warden_compliance::{AssessmentContext, ComplianceRuleEngine};
use warden_config::{AbilityConfig, CryptoConfig, OutboundConfig, WardenConfig};
use warden_crypto::{
    EnvMasterKeyProvider, FieldCipher, FileMasterKeyProvider, KeyDerivationService, MasterKey,
    MasterKeyProvider,
};
use warden_risk::{
    AssessmentStatus, Granularity, RiskAssessment, RiskSample, RiskScoringEngine, TrendPrediction,
};
use warden_types::{
    Action, DataClassification, Principal, PrincipalId, ResourceRef, ResourceType, TenantId,
};

use crate::codec::{FieldCodec, Sealed};
use crate::outbound::{
    Notification, OutboundEvent, OutboundQueue, OutboundSink, OutboundWorker, RecordingSink,
};
use crate::repository::{
    AssessmentRepository, ComplianceRecord, InMemoryAssessmentRepository, RepositoryError,
};
use crate::{Result, WardenError};

/// External collaborators the container is built around.
pub struct Backends<S, R, K> {
    pub audit_store: Arc<S>,
    pub repository: Arc<R>,
    pub outbound_sink: Arc<K>,
    pub alerts: Arc<dyn AlertSink>,
}

impl Backends<InMemoryAuditStore, InMemoryAssessmentRepository, RecordingSink> {
    /// In-process backends with alerts written to the log.
    pub fn in_memory() -> Self {
        Self {
            audit_store: Arc::new(InMemoryAuditStore::new()),
            repository: Arc::new(InMemoryAssessmentRepository::new()),
            outbound_sink: Arc::new(RecordingSink::new()),
            alerts: Arc::new(TracingAlertSink),
        }
    }
}

/// Background tasks owned by a [`Warden`].
pub struct WardenWorkers<S, K> {
    pub audit_retry: RetryWorker<S>,
    pub outbound: OutboundWorker<K>,
}

impl<S: AuditStore, K: OutboundSink> WardenWorkers<S, K> {
    /// Spawns both workers on the current runtime.
    pub fn spawn(self) -> (JoinHandle<()>, JoinHandle<()>) {
        (
            tokio::spawn(self.audit_retry.run()),
            tokio::spawn(self.outbound.run()),
        )
    }
}

/// Lifecycle step applied through [`Warden::transition_assessment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activate,
    SubmitForReview,
    /// Approval; needs signature authority.
    CompleteReview,
    Archive,
}

impl Transition {
    fn action(self) -> Action {
        match self {
            Transition::CompleteReview => Action::Approve,
            Transition::Activate | Transition::SubmitForReview | Transition::Archive => {
                Action::Update
            }
        }
    }
}

/// Wires authorization, field encryption, audit, compliance and risk.
///
/// Built once at startup and passed by reference. Every public operation
/// authorizes first, records the decision and any mutation in the tenant's
/// audit chain, and never lets an audit failure fail the operation.
pub struct Warden<S, R> {
    ability: AbilityEngine,
    codec: FieldCodec,
    ledger: AuditLedger<S>,
    compliance: ComplianceRuleEngine,
    risk: RiskScoringEngine,
    repository: Arc<R>,
    outbound: OutboundQueue,
    alerts: Arc<dyn AlertSink>,
    store_timeout: Duration,
    retention: chrono::Duration,
}

impl<S: AuditStore, R: AssessmentRepository> Warden<S, R> {
    /// Validates `config`, loads the master key and builds the container.
    ///
    /// A missing or malformed master key is a configuration error; there is
    /// no fallback key.
    pub fn bootstrap<K: OutboundSink>(
        config: &WardenConfig,
        backends: Backends<S, R, K>,
    ) -> Result<(Self, WardenWorkers<S, K>)> {
        config.validate()?;
        let master = master_key_provider(&config.crypto).load()?;
        Ok(Self::with_master_key(config, master, backends))
    }

    /// Builds the container around an already loaded master key.
    pub fn with_master_key<K: OutboundSink>(
        config: &WardenConfig,
        master: MasterKey,
        backends: Backends<S, R, K>,
    ) -> (Self, WardenWorkers<S, K>) {
        let Backends {
            audit_store,
            repository,
            outbound_sink,
            alerts,
        } = backends;

        let (ledger, audit_retry) =
            AuditLedger::new(audit_store, LedgerConfig::from(&config.audit), Arc::clone(&alerts));
        let (outbound, outbound_worker) = OutboundQueue::new(
            outbound_sink,
            config.outbound.queue_capacity,
            outbound_policy(&config.outbound),
        );

        info!(
            retention_days = config.audit.retention_days,
            business_hours_start = config.ability.business_hours_start,
            business_hours_end = config.ability.business_hours_end,
            "warden initialized"
        );

        let warden = Self {
            ability: AbilityEngine::new(ability_config(&config.ability)),
            codec: FieldCodec::new(FieldCipher::new(KeyDerivationService::new(master))),
            ledger,
            compliance: ComplianceRuleEngine::new(),
            risk: RiskScoringEngine,
            repository,
            outbound,
            alerts,
            store_timeout: config.audit.store_timeout(),
            retention: chrono::Duration::days(i64::from(config.audit.retention_days)),
        };
        let workers = WardenWorkers {
            audit_retry,
            outbound: outbound_worker,
        };
        (warden, workers)
    }

    pub fn ability(&self) -> &AbilityEngine {
        &self.ability
    }

    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    pub fn ledger(&self) -> &AuditLedger<S> {
        &self.ledger
    }

    pub fn compliance(&self) -> &ComplianceRuleEngine {
        &self.compliance
    }

    pub fn risk(&self) -> &RiskScoringEngine {
        &self.risk
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    // ------------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------------

    /// Decides and records the decision in the resource tenant's chain.
    ///
    /// Returns the decision on allow and [`WardenError::Authorization`] on deny.
    pub async fn authorize(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        action: Action,
        env: &EnvironmentAttributes,
    ) -> Result<Decision> {
        let decision = self.ability.decide(principal, resource, action, env);

        let audit_tenant = resource.tenant_id().or(principal.tenant_id.as_ref());
        if let Some(tenant_id) = audit_tenant {
            let audit_action = if decision.is_allowed() {
                AuditAction::AccessGranted
            } else {
                AuditAction::AccessDenied
            };
            let event = AuditEvent::new(principal.id.clone(), audit_action)
                .with_resource(resource.clone())
                .with_details(serde_json::json!({
                    "action": action,
                    "matched_rule": decision.matched_rule,
                }))
                .at(env.timestamp);
            self.ledger.record(event, tenant_id).await;
        }

        if decision.is_allowed() {
            Ok(decision)
        } else {
            Err(WardenError::Authorization {
                matched_rule: decision.matched_rule,
                reason: decision.reason,
            })
        }
    }

    /// Request environment for `tenant_id` at `now`.
    ///
    /// Risk level is the highest residual level among active and in-review
    /// assessments; compliance posture is the latest evaluation's verdict.
    pub async fn environment(
        &self,
        tenant_id: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<EnvironmentAttributes> {
        let assessments = self.timed(self.repository.list_assessments(tenant_id)).await?;
        let latest = self.timed(self.repository.latest_compliance(tenant_id)).await?;

        let risk_level = assessments
            .iter()
            .filter(|a| {
                matches!(
                    a.status(),
                    AssessmentStatus::Active | AssessmentStatus::UnderReview
                )
            })
            .map(|a| a.residual().level)
            .max();

        let mut env = self.ability.environment_at(now);
        if let Some(level) = risk_level {
            env = env.with_risk_level(level);
        }
        if let Some(record) = latest {
            env = env.with_compliance_posture(record.result.overall_compliant);
        }
        Ok(env)
    }

    // ------------------------------------------------------------------------
    // Protected fields
    // ------------------------------------------------------------------------

    /// Encrypts a field value being written to `resource`.
    ///
    /// `action` must be [`Action::Create`] or [`Action::Update`].
    pub async fn seal_field<T: Serialize>(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        action: Action,
        value: &T,
        env: &EnvironmentAttributes,
    ) -> Result<Sealed<T>> {
        let audit_action = match action {
            Action::Create => AuditAction::RecordCreated,
            Action::Update => AuditAction::RecordUpdated,
            other => {
                return Err(WardenError::Validation(format!(
                    "sealing a field requires create or update, got {other}"
                )));
            }
        };
        self.authorize(principal, resource, action, env).await?;
        let tenant_id = resource_tenant(resource)?;

        let sealed = self.codec.encode(value, tenant_id)?;
        let event = AuditEvent::new(principal.id.clone(), audit_action)
            .with_resource(resource.clone())
            .at(env.timestamp);
        self.ledger.record(event, tenant_id).await;
        Ok(sealed)
    }

    /// Decrypts a stored field of `resource` for `principal`.
    ///
    /// An envelope owned by another tenant fails as an authorization error
    /// before any tag check. A tag failure raises an integrity alert.
    pub async fn open_field<T: DeserializeOwned>(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        sealed: &Sealed<T>,
        env: &EnvironmentAttributes,
    ) -> Result<T> {
        self.authorize(principal, resource, Action::Read, env).await?;
        let tenant_id = resource_tenant(resource)?;

        match self.codec.decode(sealed, tenant_id) {
            Ok(value) => {
                let event = AuditEvent::new(principal.id.clone(), AuditAction::FieldDecrypted)
                    .with_resource(resource.clone())
                    .at(env.timestamp);
                self.ledger.record(event, tenant_id).await;
                Ok(value)
            }
            Err(WardenError::Integrity(detail)) => {
                self.alerts.raise(SecurityAlert::IntegrityViolation {
                    tenant_id: tenant_id.clone(),
                    detail: format!("{resource}: {detail}"),
                });
                let event = AuditEvent::new(principal.id.clone(), AuditAction::IntegrityViolation)
                    .with_resource(resource.clone())
                    .at(env.timestamp);
                self.ledger.record(event, tenant_id).await;
                Err(WardenError::Integrity(detail))
            }
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------------
    // Compliance
    // ------------------------------------------------------------------------

    /// Evaluates `ctx` for `subject`, stores the result and returns it.
    ///
    /// Findings are returned even when the evaluation fails; use
    /// [`warden_compliance::ComplianceResult::enforce`] to block on them.
    pub async fn evaluate_compliance(
        &self,
        principal: &Principal,
        subject: &str,
        ctx: &AssessmentContext,
        env: &EnvironmentAttributes,
    ) -> Result<ComplianceRecord> {
        let tenant_id = principal_tenant(principal)?;
        let resource = ResourceRef::new(tenant_id.clone(), ResourceType::ComplianceReport, subject)
            .classified(DataClassification::Confidential);
        self.authorize(principal, &resource, Action::Create, env).await?;

        let result = self.compliance.evaluate(ctx)?;
        let record =
            ComplianceRecord::new(tenant_id.clone(), subject, principal.id.clone(), result);
        self.timed(self.repository.save_compliance(record.clone())).await?;

        let event = AuditEvent::new(principal.id.clone(), AuditAction::ComplianceEvaluated)
            .with_resource(resource)
            .with_details(serde_json::json!({
                "record_id": record.id,
                "score": record.result.score,
                "overall_compliant": record.result.overall_compliant,
                "findings": record.result.findings().count(),
            }))
            .at(env.timestamp);
        self.ledger.record(event, &tenant_id).await;

        if !record.result.overall_compliant {
            self.notify(OutboundEvent::new(
                tenant_id,
                Notification::ComplianceFailed {
                    subject: subject.to_string(),
                    score: record.result.score,
                },
            ));
        }
        Ok(record)
    }

    // ------------------------------------------------------------------------
    // Risk assessments
    // ------------------------------------------------------------------------

    pub async fn create_assessment(
        &self,
        principal: &Principal,
        title: &str,
        env: &EnvironmentAttributes,
    ) -> Result<RiskAssessment> {
        let tenant_id = principal_tenant(principal)?;
        let assessment =
            RiskAssessment::new(tenant_id.clone(), title, &principal.id, env.timestamp);
        let resource = assessment_resource(&assessment);
        self.authorize(principal, &resource, Action::Create, env).await?;

        self.timed(self.repository.save_assessment(assessment.clone())).await?;
        let event = AuditEvent::new(principal.id.clone(), AuditAction::RecordCreated)
            .with_resource(resource)
            .at(env.timestamp);
        self.ledger.record(event, &tenant_id).await;
        Ok(assessment)
    }

    pub async fn load_assessment(
        &self,
        principal: &Principal,
        id: Uuid,
        env: &EnvironmentAttributes,
    ) -> Result<RiskAssessment> {
        let assessment = self.fetch_assessment(principal, id).await?;
        self.authorize(principal, &assessment_resource(&assessment), Action::Read, env)
            .await?;
        Ok(assessment)
    }

    /// Applies an edit (factors, mitigations) and stores the new version.
    pub async fn update_assessment<F>(
        &self,
        principal: &Principal,
        id: Uuid,
        env: &EnvironmentAttributes,
        edit: F,
    ) -> Result<RiskAssessment>
    where
        F: FnOnce(&mut RiskAssessment, &PrincipalId, DateTime<Utc>) -> warden_risk::Result<()>,
    {
        let mut assessment = self.fetch_assessment(principal, id).await?;
        self.authorize(principal, &assessment_resource(&assessment), Action::Update, env)
            .await?;

        let before = assessment.residual().level;
        edit(&mut assessment, &principal.id, env.timestamp)?;
        self.store_revision(principal, &assessment, env).await?;

        let after = assessment.residual().level;
        if after.is_elevated() && after > before {
            self.notify(OutboundEvent::new(
                assessment.tenant_id.clone(),
                Notification::RiskElevated {
                    assessment_id: assessment.id,
                    level: after,
                },
            ));
        }
        Ok(assessment)
    }

    /// Moves an assessment through its lifecycle.
    pub async fn transition_assessment(
        &self,
        principal: &Principal,
        id: Uuid,
        transition: Transition,
        env: &EnvironmentAttributes,
    ) -> Result<RiskAssessment> {
        let mut assessment = self.fetch_assessment(principal, id).await?;
        let resource = assessment_resource(&assessment);
        self.authorize(principal, &resource, transition.action(), env).await?;

        let by = &principal.id;
        let now = env.timestamp;
        match transition {
            Transition::Activate => assessment.activate(by, now)?,
            Transition::SubmitForReview => assessment.submit_for_review(by, now)?,
            Transition::CompleteReview => assessment.complete_review(by, now)?,
            Transition::Archive => assessment.archive(by, now)?,
        }
        self.timed(self.repository.save_assessment(assessment.clone())).await?;

        let status = format!("{:?}", assessment.status());
        let event = AuditEvent::new(by.clone(), AuditAction::AssessmentStatusChanged)
            .with_resource(resource)
            .with_details(serde_json::json!({
                "status": assessment.status(),
                "version": assessment.version(),
            }))
            .at(now);
        self.ledger.record(event, &assessment.tenant_id).await;
        self.notify(OutboundEvent::new(
            assessment.tenant_id.clone(),
            Notification::AssessmentStatusChanged {
                assessment_id: assessment.id,
                status,
            },
        ));
        Ok(assessment)
    }

    pub async fn delete_assessment(
        &self,
        principal: &Principal,
        id: Uuid,
        env: &EnvironmentAttributes,
    ) -> Result<()> {
        let assessment = self.fetch_assessment(principal, id).await?;
        let resource = assessment_resource(&assessment);
        self.authorize(principal, &resource, Action::Delete, env).await?;

        self.timed(self.repository.delete_assessment(&assessment.tenant_id, id))
            .await?;
        let event = AuditEvent::new(principal.id.clone(), AuditAction::RecordDeleted)
            .with_resource(resource)
            .at(env.timestamp);
        self.ledger.record(event, &assessment.tenant_id).await;
        Ok(())
    }

    /// Trend of the tenant's risk scores across every assessment revision.
    pub async fn risk_trend(
        &self,
        principal: &Principal,
        granularity: Granularity,
        env: &EnvironmentAttributes,
    ) -> Result<TrendPrediction> {
        let tenant_id = principal_tenant(principal)?;
        let resource = ResourceRef::new(tenant_id.clone(), ResourceType::RiskAssessment, "trend")
            .classified(DataClassification::Internal);
        self.authorize(principal, &resource, Action::Read, env).await?;

        let assessments = self.timed(self.repository.list_assessments(&tenant_id)).await?;
        let samples: Vec<RiskSample> = assessments
            .iter()
            .flat_map(RiskAssessment::history)
            .filter(|version| !version.factors.is_empty())
            .map(|version| RiskSample {
                at: version.recorded_at,
                score: version.score.score,
            })
            .collect();

        let periods = warden_risk::aggregate(&samples, granularity);
        Ok(self.risk.predict_trend(&periods))
    }

    // ------------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------------

    /// Verifies the principal's tenant chain. A break raises a security alert
    /// and notifies the tenant.
    pub async fn verify_audit_chain(
        &self,
        principal: &Principal,
        env: &EnvironmentAttributes,
    ) -> Result<ChainVerification> {
        let tenant_id = principal_tenant(principal)?;
        let resource = ResourceRef::new(tenant_id.clone(), ResourceType::AuditLog, "chain")
            .classified(DataClassification::Confidential);
        self.authorize(principal, &resource, Action::Read, env).await?;

        let verification = self.ledger.verify_all(&tenant_id).await?;
        if let ChainVerification::Broken { index, .. } = verification {
            self.notify(OutboundEvent::new(tenant_id, Notification::AuditChainBroken { index }));
        }
        Ok(verification)
    }

    pub async fn audit_trail(
        &self,
        principal: &Principal,
        query: &AuditQuery,
        env: &EnvironmentAttributes,
    ) -> Result<Vec<AuditEntry>> {
        let tenant_id = principal_tenant(principal)?;
        let resource = ResourceRef::new(tenant_id.clone(), ResourceType::AuditLog, "trail")
            .classified(DataClassification::Confidential);
        self.authorize(principal, &resource, Action::Read, env).await?;
        Ok(self.ledger.query(&tenant_id, query).await?)
    }

    /// Retires the principal's tenant entries older than the configured
    /// retention, measured from `env.timestamp`. Retiring is a delete on the
    /// audit log, so only roles allowed to delete it may run it and only
    /// inside business hours.
    pub async fn retire_expired_audit(
        &self,
        principal: &Principal,
        env: &EnvironmentAttributes,
    ) -> Result<usize> {
        let tenant_id = principal_tenant(principal)?;
        let resource = ResourceRef::new(tenant_id.clone(), ResourceType::AuditLog, "retention")
            .classified(DataClassification::Confidential);
        self.authorize(principal, &resource, Action::Delete, env).await?;
        Ok(self
            .ledger
            .retire_expired(&tenant_id, env.timestamp, self.retention)
            .await?)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn timed<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, RepositoryError>>,
    ) -> Result<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| WardenError::Timeout(self.store_timeout))?
            .map_err(WardenError::from)
    }

    async fn fetch_assessment(&self, principal: &Principal, id: Uuid) -> Result<RiskAssessment> {
        let tenant_id = principal_tenant(principal)?;
        self.timed(self.repository.load_assessment(&tenant_id, id))
            .await?
            .ok_or_else(|| WardenError::NotFound {
                kind: "risk assessment",
                id: id.to_string(),
            })
    }

    async fn store_revision(
        &self,
        principal: &Principal,
        assessment: &RiskAssessment,
        env: &EnvironmentAttributes,
    ) -> Result<()> {
        self.timed(self.repository.save_assessment(assessment.clone())).await?;
        let score = assessment.score();
        let residual = assessment.residual();
        let event = AuditEvent::new(principal.id.clone(), AuditAction::RiskScored)
            .with_resource(assessment_resource(assessment))
            .with_details(serde_json::json!({
                "version": assessment.version(),
                "score": score.score,
                "level": score.level,
                "residual": residual.residual,
                "residual_level": residual.level,
            }))
            .at(env.timestamp);
        self.ledger.record(event, &assessment.tenant_id).await;
        Ok(())
    }

    fn notify(&self, event: OutboundEvent) {
        if let Err(e) = self.outbound.enqueue(event) {
            warn!(error = %e, "notification not queued");
        }
    }
}

fn master_key_provider(config: &CryptoConfig) -> Box<dyn MasterKeyProvider> {
    match &config.master_key_file {
        Some(path) => Box::new(FileMasterKeyProvider::new(path)),
        None => Box::new(EnvMasterKeyProvider::new(&config.master_key_env)),
    }
}

fn ability_config(ability: &AbilityConfig) -> warden_ability::AbilityConfig {
    warden_ability::AbilityConfig {
        business_hours: BusinessHours {
            start_hour: ability.business_hours_start,
            end_hour: ability.business_hours_end,
        },
        signature: SignatureThresholds {
            internal: ability.signature_internal,
            confidential: ability.signature_confidential,
            restricted: ability.signature_restricted,
            high_risk_increment: ability.signature_high_risk_increment,
            critical_risk_increment: ability.signature_critical_risk_increment,
        },
    }
}

fn outbound_policy(outbound: &OutboundConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: outbound.max_delivery_attempts,
        initial_backoff: Duration::from_millis(outbound.initial_backoff_ms),
        max_backoff: Duration::from_millis(outbound.max_backoff_ms),
    }
}

fn principal_tenant(principal: &Principal) -> Result<TenantId> {
    principal.tenant_id.clone().ok_or_else(|| {
        warn!(principal = %principal.id, "request without tenant context");
        WardenError::Authorization {
            matched_rule: TENANT_CONTEXT_MISSING.to_string(),
            reason: "tenant context is required".to_string(),
        }
    })
}

fn resource_tenant(resource: &ResourceRef) -> Result<&TenantId> {
    resource.tenant_id().ok_or_else(|| WardenError::Authorization {
        matched_rule: TENANT_CONTEXT_MISSING.to_string(),
        reason: "tenant context is required".to_string(),
    })
}

fn assessment_resource(assessment: &RiskAssessment) -> ResourceRef {
    let resource = ResourceRef::new(
        assessment.tenant_id.clone(),
        ResourceType::RiskAssessment,
        assessment.id.to_string(),
    )
    .classified(DataClassification::Confidential);
    match assessment.history().first() {
        Some(created) => resource.owned_by(created.changed_by.clone()),
        None => resource,
    }
}
