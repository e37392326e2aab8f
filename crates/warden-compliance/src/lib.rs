//! # warden-compliance: multi-framework compliance evaluation
//!
//! Evaluates a normalized [`AssessmentContext`] against static rule catalogs
//! for GDPR, HIPAA, SOX, PCI DSS, AML and KYC.
//!
//! Evaluation runs in two stages:
//! 1. Every in-scope framework evaluates its own rules independently (in
//!    parallel) and computes a framework risk level.
//! 2. Derived rules that depend on another framework's outcome run against
//!    the Stage 1 results, e.g. KYC enhanced due diligence gated on the AML
//!    risk level.
//!
//! Findings are advisory. [`ComplianceResult::enforce`] turns a non-compliant
//! result into [`ComplianceError::Violation`] for callers that block on it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod catalog;
mod context;
mod engine;
mod result;
mod rule;

pub use context::{
    AssessmentContext, CustomerProfile, DataProcessing, Governance, LawfulBasis, SecurityControls,
};
pub use engine::ComplianceRuleEngine;
pub use result::{ComplianceFinding, ComplianceResult, FrameworkResult};
pub use rule::{ComplianceRule, DerivedRule, FrameworkCatalog};

/// Result type for compliance operations
pub type Result<T> = std::result::Result<T, ComplianceError>;

/// Errors that can occur during compliance evaluation
#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("Invalid assessment context: {0}")]
    Validation(String),

    #[error("Invalid framework: {0}")]
    InvalidFramework(String),

    #[error("Compliance violation: {} finding(s), score {score}", findings.len())]
    Violation {
        score: u32,
        findings: Vec<ComplianceFinding>,
    },
}

/// Regulatory frameworks with rule catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComplianceFramework {
    /// General Data Protection Regulation
    GDPR,
    /// Health Insurance Portability and Accountability Act
    HIPAA,
    /// Sarbanes-Oxley Act
    SOX,
    /// Payment Card Industry Data Security Standard
    #[serde(rename = "PCI_DSS")]
    PCIDSS,
    /// Anti-Money Laundering
    AML,
    /// Know Your Customer
    KYC,
}

impl ComplianceFramework {
    /// Get the full name of the framework
    pub fn full_name(&self) -> &'static str {
        match self {
            Self::GDPR => "General Data Protection Regulation",
            Self::HIPAA => "Health Insurance Portability and Accountability Act",
            Self::SOX => "Sarbanes-Oxley Act",
            Self::PCIDSS => "Payment Card Industry Data Security Standard",
            Self::AML => "Anti-Money Laundering",
            Self::KYC => "Know Your Customer",
        }
    }

    /// Whether the framework's rules need a customer profile.
    pub fn requires_customer(&self) -> bool {
        matches!(self, Self::AML | Self::KYC)
    }

    /// Get all supported frameworks
    pub fn all() -> Vec<Self> {
        vec![
            Self::GDPR,
            Self::HIPAA,
            Self::SOX,
            Self::PCIDSS,
            Self::AML,
            Self::KYC,
        ]
    }
}

impl std::fmt::Display for ComplianceFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GDPR => write!(f, "GDPR"),
            Self::HIPAA => write!(f, "HIPAA"),
            Self::SOX => write!(f, "SOX"),
            Self::PCIDSS => write!(f, "PCI DSS"),
            Self::AML => write!(f, "AML"),
            Self::KYC => write!(f, "KYC"),
        }
    }
}

impl std::str::FromStr for ComplianceFramework {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GDPR" => Ok(Self::GDPR),
            "HIPAA" => Ok(Self::HIPAA),
            "SOX" => Ok(Self::SOX),
            "PCIDSS" | "PCI_DSS" | "PCI-DSS" | "PCI DSS" => Ok(Self::PCIDSS),
            "AML" => Ok(Self::AML),
            "KYC" => Ok(Self::KYC),
            _ => Err(ComplianceError::InvalidFramework(s.to_string())),
        }
    }
}
