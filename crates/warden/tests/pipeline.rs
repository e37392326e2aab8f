//! End-to-end checks of the request pipeline through the `Warden` container.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use warden::audit::{
    AuditEntry, AuditStore, ChainTail, CollectingAlertSink, InMemoryAuditStore, SecurityAlert,
    StoreError,
};
use warden::config::ConfigLoader;
use warden::crypto::MasterKey;
use warden::risk::{RiskCategory, RiskFactor};
use warden::types::{Hash, Severity};
use warden::{
    Action, AssessmentContext, Backends, ChainVerification, ComplianceFramework,
    DataClassification, EnvironmentAttributes, InMemoryAssessmentRepository, Principal,
    RecordingSink, ResourceRef, ResourceType, Role, TenantId, Transition, Warden, WardenConfig,
    WardenError,
};

/// Audit store that corrupts one entry's hash on read.
struct TamperingStore {
    inner: InMemoryAuditStore,
    corrupt_sequence: AtomicU64,
}

impl TamperingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryAuditStore::new(),
            corrupt_sequence: AtomicU64::new(u64::MAX),
        }
    }

    fn corrupt(&self, sequence: u64) {
        self.corrupt_sequence.store(sequence, Ordering::SeqCst);
    }
}

impl AuditStore for TamperingStore {
    async fn tail(&self, tenant_id: &TenantId) -> Result<Option<ChainTail>, StoreError> {
        self.inner.tail(tenant_id).await
    }

    async fn append_if_tail(
        &self,
        entry: AuditEntry,
        expected_prev: Hash,
    ) -> Result<(), StoreError> {
        self.inner.append_if_tail(entry, expected_prev).await
    }

    async fn read_range(
        &self,
        tenant_id: &TenantId,
        range: Range<u64>,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let target = self.corrupt_sequence.load(Ordering::SeqCst);
        let mut entries = self.inner.read_range(tenant_id, range).await?;
        for entry in &mut entries {
            if entry.sequence == target {
                entry.current_hash = entry.current_hash.with_bit_flipped(11);
            }
        }
        Ok(entries)
    }

    async fn mark_retired(
        &self,
        tenant_id: &TenantId,
        sequences: &[u64],
    ) -> Result<usize, StoreError> {
        self.inner.mark_retired(tenant_id, sequences).await
    }
}

type MemoryWarden = Warden<InMemoryAuditStore, InMemoryAssessmentRepository>;

fn tenant(id: &str) -> TenantId {
    TenantId::parse(id).unwrap()
}

/// Wednesday 2025-06-11, 14:00 UTC.
fn weekday_afternoon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 11, 14, 0, 0).unwrap()
}

fn memory_warden() -> MemoryWarden {
    let master = MasterKey::from_slice(&[0x42; 32]).unwrap();
    let (warden, _workers) =
        Warden::with_master_key(&WardenConfig::default(), master, Backends::in_memory());
    warden
}

#[test]
fn bootstrap_from_layered_config_and_key_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("master.key"),
        MasterKey::generate().to_base64().as_bytes(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("warden.toml"),
        "[crypto]\nmaster_key_file = \"master.key\"\n\n[outbound]\nqueue_capacity = 4\n",
    )
    .unwrap();

    let config = ConfigLoader::new()
        .with_project_dir(dir.path())
        .with_env_prefix("WARDEN_PIPELINE_TEST")
        .without_user_config()
        .load()
        .unwrap();
    assert_eq!(config.crypto.master_key_file, Some(dir.path().join("master.key")));

    assert!(MemoryWarden::bootstrap(&config, Backends::in_memory()).is_ok());
}

#[test]
fn bootstrap_without_key_material_fails() {
    let mut config = WardenConfig::default();
    config.crypto.master_key_file = Some("/nonexistent/warden/master.key".into());

    let err = MemoryWarden::bootstrap(&config, Backends::in_memory())
        .err()
        .unwrap();
    assert!(matches!(err, WardenError::Configuration(_)));
}

#[tokio::test]
async fn cross_tenant_field_is_an_authorization_error() {
    let warden = memory_warden();
    let env = EnvironmentAttributes::from_timestamp(weekday_afternoon());

    let globex = tenant("globex");
    let globex_partner = Principal::new("gp", globex.clone(), Role::Partner);
    let globex_record = ResourceRef::new(globex, ResourceType::CustomerRecord, "c-7");
    let sealed = warden
        .seal_field(&globex_partner, &globex_record, Action::Create, &"4111-1111".to_string(), &env)
        .await
        .unwrap();

    // An acme partner presents globex's envelope as if it were an acme field.
    let acme = tenant("acme");
    let acme_partner = Principal::new("ap", acme.clone(), Role::Partner);
    let acme_record = ResourceRef::new(acme, ResourceType::CustomerRecord, "c-7");
    let err = warden
        .open_field(&acme_partner, &acme_record, &sealed, &env)
        .await
        .unwrap_err();

    match err {
        WardenError::Authorization { matched_rule, .. } => {
            assert_eq!(matched_rule, "tenant-boundary");
        }
        other => panic!("expected authorization error, got {other:?}"),
    }
}

#[tokio::test]
async fn failing_compliance_places_exports_on_hold() {
    let warden = memory_warden();
    let acme = tenant("acme");
    let now = weekday_afternoon();
    let env = EnvironmentAttributes::from_timestamp(now);

    let officer = Principal::new("co", acme.clone(), Role::ComplianceOfficer);
    let mut ctx = AssessmentContext::new(now).with_frameworks([ComplianceFramework::PCIDSS]);
    ctx.controls.stores_card_verification_code = true;

    let record = warden
        .evaluate_compliance(&officer, "card-platform", &ctx, &env)
        .await
        .unwrap();
    assert!(!record.result.overall_compliant);
    assert_eq!(record.result.score, 70);
    assert_eq!(record.result.findings().count(), 1);
    assert!(matches!(
        record.result.clone().enforce(),
        Err(warden::compliance::ComplianceError::Violation { score: 70, .. })
    ));

    let auditor = Principal::new("aud", acme.clone(), Role::Auditor);
    let log = ResourceRef::new(acme.clone(), ResourceType::AuditLog, "2025");

    let env = warden.environment(&acme, now).await.unwrap();
    assert_eq!(env.compliant, Some(false));
    assert!(warden.authorize(&auditor, &log, Action::Read, &env).await.is_ok());
    let err = warden
        .authorize(&auditor, &log, Action::Export, &env)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::Authorization { matched_rule, .. } if matched_rule == "compliance-hold-export"
    ));
}

#[tokio::test]
async fn critical_risk_raises_required_signature_authority() {
    let warden = memory_warden();
    let acme = tenant("acme");
    let now = weekday_afternoon();
    let env = EnvironmentAttributes::from_timestamp(now);

    let analyst = Principal::new("ra", acme.clone(), Role::RiskAnalyst);
    let assessment = warden.create_assessment(&analyst, "treasury", &env).await.unwrap();
    let id = assessment.id;
    warden
        .update_assessment(&analyst, id, &env, |a, by, at| {
            let factor = RiskFactor::new(RiskCategory::Financial, Severity::Critical, 5, 5)?;
            a.add_factor(factor, by, at)
        })
        .await
        .unwrap();
    warden
        .transition_assessment(&analyst, id, Transition::Activate, &env)
        .await
        .unwrap();
    warden
        .transition_assessment(&analyst, id, Transition::SubmitForReview, &env)
        .await
        .unwrap();

    let env = warden.environment(&acme, now).await.unwrap();
    assert_eq!(env.risk_level, Some(warden::types::RiskLevel::Critical));

    // Confidential needs 2; critical risk adds 2.
    let junior =
        Principal::new("p-junior", acme.clone(), Role::Partner).with_signature_authority(2);
    let err = warden
        .transition_assessment(&junior, id, Transition::CompleteReview, &env)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WardenError::Authorization { matched_rule, .. }
            if matched_rule == "signature-authority-insufficient"
    ));

    let senior = Principal::new("p-senior", acme, Role::Partner).with_signature_authority(4);
    let reviewed = warden
        .transition_assessment(&senior, id, Transition::CompleteReview, &env)
        .await
        .unwrap();
    assert_eq!(reviewed.status(), warden::risk::AssessmentStatus::Active);
}

#[tokio::test]
async fn tampered_audit_entry_is_reported_at_its_index() {
    let store = Arc::new(TamperingStore::new());
    let alerts = Arc::new(CollectingAlertSink::new());
    let backends = Backends {
        audit_store: Arc::clone(&store),
        repository: Arc::new(InMemoryAssessmentRepository::new()),
        outbound_sink: Arc::new(RecordingSink::new()),
        alerts: alerts.clone(),
    };
    let master = MasterKey::from_slice(&[0x42; 32]).unwrap();
    let (warden, _workers) = Warden::with_master_key(&WardenConfig::default(), master, backends);

    let acme = tenant("acme");
    let env = EnvironmentAttributes::from_timestamp(weekday_afternoon());
    let auditor = Principal::new("aud", acme.clone(), Role::Auditor);
    let policy = ResourceRef::new(acme, ResourceType::Policy, "retention")
        .classified(DataClassification::Internal);
    for _ in 0..5 {
        warden.authorize(&auditor, &policy, Action::Read, &env).await.unwrap();
    }

    let intact = warden.verify_audit_chain(&auditor, &env).await.unwrap();
    assert!(intact.is_intact());

    store.corrupt(3);
    let broken = warden.verify_audit_chain(&auditor, &env).await.unwrap();
    assert_eq!(broken.first_break(), Some(3));
    assert!(matches!(broken, ChainVerification::Broken { index: 3, .. }));
    assert!(
        alerts
            .alerts()
            .iter()
            .any(|alert| matches!(alert, SecurityAlert::ChainBroken { index: 3, .. }))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_decisions_form_one_chain() {
    let warden = Arc::new(memory_warden());
    let acme = tenant("acme");
    let env = EnvironmentAttributes::from_timestamp(weekday_afternoon());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let warden = Arc::clone(&warden);
        let acme = acme.clone();
        let env = env.clone();
        tasks.push(tokio::spawn(async move {
            let associate = Principal::new(format!("assoc-{i}"), acme.clone(), Role::Associate);
            let doc = ResourceRef::new(acme, ResourceType::Document, format!("doc-{i}"));
            warden.authorize(&associate, &doc, Action::Read, &env).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let auditor = Principal::new("aud", acme.clone(), Role::Auditor);
    let verification = warden.verify_audit_chain(&auditor, &env).await.unwrap();
    // 16 decisions plus the auditor's own access to the chain.
    assert_eq!(
        verification,
        ChainVerification::Intact { entries_checked: 17 }
    );
}
