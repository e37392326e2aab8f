//! Decision evaluation.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use warden_types::{Action, Principal, ResourceRef};

use crate::attributes::{BusinessHours, EnvironmentAttributes};
use crate::policy::{Effect, Request, Rule, SignatureThresholds};
use crate::rules::{OVERRIDES, role_rules};
use crate::{AbilityError, Result};

/// Reported when no rule matched.
pub const DEFAULT_DENY: &str = "default-deny";

/// Reported when the principal or resource carries no tenant.
pub const TENANT_CONTEXT_MISSING: &str = "tenant-context-missing";

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub effect: Effect,
    /// Id of the deciding rule, or [`DEFAULT_DENY`].
    pub matched_rule: String,
    pub reason: String,
}

impl Decision {
    fn from_rule(rule: &Rule) -> Self {
        Self {
            effect: rule.effect,
            matched_rule: rule.id.to_string(),
            reason: rule.reason.to_string(),
        }
    }

    fn deny(matched_rule: &str, reason: &str) -> Self {
        Self {
            effect: Effect::Deny,
            matched_rule: matched_rule.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }

    /// `Ok(())` on allow, [`AbilityError::Denied`] otherwise.
    pub fn into_result(self) -> Result<()> {
        match self.effect {
            Effect::Allow => Ok(()),
            Effect::Deny => Err(AbilityError::Denied {
                matched_rule: self.matched_rule,
                reason: self.reason,
            }),
        }
    }
}

/// Tunables for the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityConfig {
    pub business_hours: BusinessHours,
    pub signature: SignatureThresholds,
}

/// Stateless authorization engine.
#[derive(Debug, Clone, Default)]
pub struct AbilityEngine {
    config: AbilityConfig,
}

impl AbilityEngine {
    pub fn new(config: AbilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AbilityConfig {
        &self.config
    }

    /// Environment attributes at `ts` using the configured business hours.
    pub fn environment_at(&self, ts: chrono::DateTime<chrono::Utc>) -> EnvironmentAttributes {
        EnvironmentAttributes::with_hours(ts, self.config.business_hours)
    }

    /// Decides whether `principal` may perform `action` on `resource`.
    ///
    /// Logs grants at info and denials at warn.
    pub fn decide(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        action: Action,
        env: &EnvironmentAttributes,
    ) -> Decision {
        let decision = self.evaluate(principal, resource, action, env);
        if decision.is_allowed() {
            info!(
                principal = %principal.id,
                role = %principal.role,
                %action,
                resource = %resource,
                rule = %decision.matched_rule,
                "access granted"
            );
        } else {
            warn!(
                principal = %principal.id,
                role = %principal.role,
                %action,
                resource = %resource,
                rule = %decision.matched_rule,
                "access denied"
            );
        }
        decision
    }

    /// Actions `principal` may currently perform on `resource`.
    pub fn permitted_actions(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        env: &EnvironmentAttributes,
    ) -> Vec<Action> {
        Action::all()
            .iter()
            .copied()
            .filter(|&action| self.evaluate(principal, resource, action, env).is_allowed())
            .collect()
    }

    fn evaluate(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        action: Action,
        env: &EnvironmentAttributes,
    ) -> Decision {
        if principal.tenant_id.is_none() || resource.tenant_id().is_none() {
            return Decision::deny(TENANT_CONTEXT_MISSING, "tenant context missing");
        }

        let req = Request {
            principal,
            resource,
            env,
            thresholds: &self.config.signature,
        };

        // Last match wins, so scan from the end.
        OVERRIDES
            .iter()
            .rev()
            .chain(role_rules(principal.role).iter().rev())
            .find(|rule| rule.matches(action, &req))
            .map_or_else(
                || Decision::deny(DEFAULT_DENY, "no rule grants this action"),
                Decision::from_rule,
            )
    }
}
