//! Principal snapshots supplied by the authentication layer.
//!
//! A [`Principal`] is read-only for the duration of a request. The tenant is
//! optional because snapshots come from an external identity provider; a
//! principal without a tenant is denied everything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PrincipalId, TenantId};

/// Highest signature authority a principal can hold.
pub const MAX_SIGNATURE_AUTHORITY: u8 = 5;

/// Organizational role of a principal within its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Tenant administrator: manages everything inside the tenant.
    Admin,
    /// Engagement partner: full authority over client work.
    Partner,
    ComplianceOfficer,
    RiskAnalyst,
    /// Staff member working under supervision.
    Associate,
    /// Read-mostly access to evidence.
    Auditor,
    /// External client user.
    Client,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[
            Role::Admin,
            Role::Partner,
            Role::ComplianceOfficer,
            Role::RiskAnalyst,
            Role::Associate,
            Role::Auditor,
            Role::Client,
        ]
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Admin => "ADMIN",
            Role::Partner => "PARTNER",
            Role::ComplianceOfficer => "COMPLIANCE_OFFICER",
            Role::RiskAnalyst => "RISK_ANALYST",
            Role::Associate => "ASSOCIATE",
            Role::Auditor => "AUDITOR",
            Role::Client => "CLIENT",
        };
        f.write_str(name)
    }
}

/// Declared purpose of processing, used for consent and purpose limitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Purpose {
    ServiceDelivery,
    Compliance,
    RiskAssessment,
    Marketing,
    Analytics,
}

/// A consent grant held by a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub purpose: Purpose,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl ConsentRecord {
    pub fn granted(purpose: Purpose, granted_at: DateTime<Utc>) -> Self {
        Self {
            purpose,
            granted_at,
            expires_at: None,
            withdrawn_at: None,
        }
    }

    pub fn expiring(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn withdrawn(mut self, withdrawn_at: DateTime<Utc>) -> Self {
        self.withdrawn_at = Some(withdrawn_at);
        self
    }

    /// A consent is active if it was not withdrawn and has not yet expired at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.withdrawn_at.is_some_and(|w| w <= now) {
            return false;
        }
        self.expires_at.is_none_or(|e| e > now)
    }
}

/// Attributes of a principal that feed attribute-based conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalAttributes {
    pub mfa_enabled: bool,
    pub consent_records: Vec<ConsentRecord>,
    /// 0 = none, 5 = may sign anything.
    pub signature_authority_level: u8,
    pub authorized_purposes: Vec<Purpose>,
}

impl PrincipalAttributes {
    /// True when some purpose has consent records and none of them is active.
    ///
    /// A renewed consent (a later active record for the same purpose) supersedes
    /// an expired one.
    pub fn has_lapsed_consent(&self, now: DateTime<Utc>) -> bool {
        self.consent_records.iter().any(|record| {
            !record.is_active(now)
                && !self
                    .consent_records
                    .iter()
                    .any(|other| other.purpose == record.purpose && other.is_active(now))
        })
    }
}

/// Snapshot of the authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub tenant_id: Option<TenantId>,
    pub role: Role,
    pub attributes: PrincipalAttributes,
}

impl Principal {
    pub fn new(id: impl Into<PrincipalId>, tenant_id: TenantId, role: Role) -> Self {
        Self {
            id: id.into(),
            tenant_id: Some(tenant_id),
            role,
            attributes: PrincipalAttributes::default(),
        }
    }

    /// Principal snapshot that carries no tenant context.
    pub fn without_tenant(id: impl Into<PrincipalId>, role: Role) -> Self {
        Self {
            id: id.into(),
            tenant_id: None,
            role,
            attributes: PrincipalAttributes::default(),
        }
    }

    pub fn with_mfa(mut self, enabled: bool) -> Self {
        self.attributes.mfa_enabled = enabled;
        self
    }

    pub fn with_signature_authority(mut self, level: u8) -> Self {
        self.attributes.signature_authority_level = level.min(MAX_SIGNATURE_AUTHORITY);
        self
    }

    pub fn with_consent(mut self, record: ConsentRecord) -> Self {
        self.attributes.consent_records.push(record);
        self
    }

    pub fn with_purpose(mut self, purpose: Purpose) -> Self {
        self.attributes.authorized_purposes.push(purpose);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 10, 0, 0).unwrap()
    }

    #[test]
    fn consent_without_expiry_is_active() {
        let consent = ConsentRecord::granted(Purpose::ServiceDelivery, now() - Duration::days(30));
        assert!(consent.is_active(now()));
    }

    #[test]
    fn consent_expiry_is_exclusive() {
        let consent = ConsentRecord::granted(Purpose::Marketing, now() - Duration::days(30))
            .expiring(now());
        assert!(!consent.is_active(now()));
        assert!(consent.is_active(now() - Duration::seconds(1)));
    }

    #[test]
    fn withdrawn_consent_is_inactive() {
        let consent = ConsentRecord::granted(Purpose::Analytics, now() - Duration::days(3))
            .withdrawn(now() - Duration::days(1));
        assert!(!consent.is_active(now()));
    }

    #[test]
    fn renewed_consent_supersedes_expired_one() {
        let expired = ConsentRecord::granted(Purpose::Compliance, now() - Duration::days(400))
            .expiring(now() - Duration::days(35));
        let renewed = ConsentRecord::granted(Purpose::Compliance, now() - Duration::days(35));

        let attrs = PrincipalAttributes {
            consent_records: vec![expired.clone()],
            ..Default::default()
        };
        assert!(attrs.has_lapsed_consent(now()));

        let attrs = PrincipalAttributes {
            consent_records: vec![expired, renewed],
            ..Default::default()
        };
        assert!(!attrs.has_lapsed_consent(now()));
    }

    #[test]
    fn signature_authority_is_capped() {
        let tenant = TenantId::parse("acme").unwrap();
        let principal = Principal::new("u1", tenant, Role::Partner).with_signature_authority(9);
        assert_eq!(
            principal.attributes.signature_authority_level,
            MAX_SIGNATURE_AUTHORITY
        );
    }
}
