//! Resources and the actions that can be taken on them.

use serde::{Deserialize, Serialize};

use crate::{DataClassification, PrincipalId, TenantId};

/// Kind of resource an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    RiskAssessment,
    ComplianceReport,
    AuditLog,
    CustomerRecord,
    Document,
    Transaction,
    Policy,
    User,
}

impl ResourceType {
    pub fn all() -> &'static [ResourceType] {
        &[
            ResourceType::RiskAssessment,
            ResourceType::ComplianceReport,
            ResourceType::AuditLog,
            ResourceType::CustomerRecord,
            ResourceType::Document,
            ResourceType::Transaction,
            ResourceType::Policy,
            ResourceType::User,
        ]
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceType::RiskAssessment => "risk_assessment",
            ResourceType::ComplianceReport => "compliance_report",
            ResourceType::AuditLog => "audit_log",
            ResourceType::CustomerRecord => "customer_record",
            ResourceType::Document => "document",
            ResourceType::Transaction => "transaction",
            ResourceType::Policy => "policy",
            ResourceType::User => "user",
        };
        f.write_str(name)
    }
}

/// Operation a principal wants to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Export,
    Approve,
    Sign,
}

impl Action {
    pub fn all() -> &'static [Action] {
        &[
            Action::Create,
            Action::Read,
            Action::Update,
            Action::Delete,
            Action::Export,
            Action::Approve,
            Action::Sign,
        ]
    }

    /// True for actions that change persisted state.
    pub fn is_mutation(self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::Delete)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Export => "export",
            Action::Approve => "approve",
            Action::Sign => "sign",
        };
        f.write_str(name)
    }
}

/// Reference to a tenant-owned resource.
///
/// The owning tenant is fixed when the reference is built; there is no way to
/// move a resource to another tenant through this type. The tenant is optional
/// only because references are also rebuilt from external snapshots, and a
/// reference without a tenant is never authorized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    resource_type: ResourceType,
    resource_id: String,
    tenant_id: Option<TenantId>,
    classification: DataClassification,
    owners: Vec<PrincipalId>,
}

impl ResourceRef {
    pub fn new(
        tenant_id: TenantId,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            tenant_id: Some(tenant_id),
            classification: DataClassification::default(),
            owners: Vec::new(),
        }
    }

    /// A reference whose owning tenant is unknown.
    pub fn unscoped(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            tenant_id: None,
            classification: DataClassification::default(),
            owners: Vec::new(),
        }
    }

    pub fn classified(mut self, classification: DataClassification) -> Self {
        self.classification = classification;
        self
    }

    pub fn owned_by(mut self, owner: impl Into<PrincipalId>) -> Self {
        self.owners.push(owner.into());
        self
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    pub fn classification(&self) -> DataClassification {
        self.classification
    }

    pub fn owners(&self) -> &[PrincipalId] {
        &self.owners
    }

    pub fn is_owned_by(&self, principal: &PrincipalId) -> bool {
        self.owners.contains(principal)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tenant_id {
            Some(tenant) => write!(f, "{tenant}/{}/{}", self.resource_type, self.resource_id),
            None => write!(f, "?/{}/{}", self.resource_type, self.resource_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ref_builder() {
        let tenant = TenantId::parse("acme").unwrap();
        let resource = ResourceRef::new(tenant.clone(), ResourceType::CustomerRecord, "cust-1")
            .classified(DataClassification::Restricted)
            .owned_by("alice");

        assert_eq!(resource.tenant_id(), Some(&tenant));
        assert_eq!(resource.classification(), DataClassification::Restricted);
        assert!(resource.is_owned_by(&PrincipalId::from("alice")));
        assert!(!resource.is_owned_by(&PrincipalId::from("bob")));
        assert_eq!(resource.to_string(), "acme/customer_record/cust-1");
    }

    #[test]
    fn unscoped_resource_has_no_tenant() {
        let resource = ResourceRef::unscoped(ResourceType::Document, "doc-9");
        assert!(resource.tenant_id().is_none());
        assert_eq!(resource.to_string(), "?/document/doc-9");
    }

    #[test]
    fn mutations() {
        assert!(Action::Update.is_mutation());
        assert!(!Action::Export.is_mutation());
    }
}
