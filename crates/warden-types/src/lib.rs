//! # warden-types: Core types for `Warden`
//!
//! This crate contains shared types used across the `Warden` system:
//! - Entity IDs ([`TenantId`], [`PrincipalId`])
//! - Cryptographic types ([`struct@Hash`])
//! - Data classification ([`DataClassification`])
//! - Risk vocabulary ([`Severity`], [`RiskLevel`])
//! - Principal snapshots ([`Principal`], [`PrincipalAttributes`], [`ConsentRecord`], [`Role`])
//! - Resource references ([`ResourceRef`], [`ResourceType`], [`Action`])

use std::fmt::{Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod principal;
mod resource;

pub use principal::{
    ConsentRecord, MAX_SIGNATURE_AUTHORITY, Principal, PrincipalAttributes, Purpose, Role,
};
pub use resource::{Action, ResourceRef, ResourceType};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier exceeds {max} characters (got {len})")]
    TooLong { len: usize, max: usize },

    #[error("identifier must start with an ASCII letter or digit")]
    InvalidStart,

    #[error("identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}

// ============================================================================
// Entity IDs
// ============================================================================

/// Maximum length of a tenant identifier.
pub const MAX_TENANT_ID_LEN: usize = 64;

/// Unique identifier for a tenant (organization/customer).
///
/// Tenant identifiers are 1-64 ASCII characters. The first character must be
/// alphanumeric and the rest may also contain `-` and `_`. Every value of this
/// type has passed [`TenantId::parse`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parses and validates a tenant identifier.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        validate_tenant_id(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

fn validate_tenant_id(raw: &str) -> Result<(), IdentifierError> {
    let mut chars = raw.chars();
    let first = chars.next().ok_or(IdentifierError::Empty)?;
    if raw.len() > MAX_TENANT_ID_LEN {
        return Err(IdentifierError::TooLong {
            len: raw.len(),
            max: MAX_TENANT_ID_LEN,
        });
    }
    if !first.is_ascii_alphanumeric() {
        return Err(IdentifierError::InvalidStart);
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
        return Err(IdentifierError::InvalidCharacter(bad));
    }
    Ok(())
}

impl Debug for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_tenant_id(&value)?;
        Ok(Self(value))
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Identifier of an authenticated principal (user or service account).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PrincipalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Hash - 32-byte digest
// ============================================================================

/// Length of hash digests in bytes (SHA-256 output size).
pub const HASH_LENGTH: usize = 32;

/// A 32-byte cryptographic hash.
///
/// Used for audit chain links (`prev_hash`/`current_hash`). The algorithm
/// (SHA-256) is chosen where the hash is computed; this type only stores
/// the digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LENGTH]);

impl Hash {
    /// The genesis hash (all zeros) used as `prev_hash` for the first entry of a chain.
    pub const GENESIS: Hash = Hash([0u8; HASH_LENGTH]);

    pub fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn is_genesis(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    /// Returns a copy with one bit inverted. Used by tamper-detection tests
    /// and chaos tooling.
    pub fn with_bit_flipped(mut self, bit: usize) -> Self {
        let bit = bit % (HASH_LENGTH * 8);
        self.0[bit / 8] ^= 1 << (bit % 8);
        self
    }
}

impl Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 bytes are enough to tell chain links apart in logs.
        write!(
            f,
            "Hash({:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5], self.0[6], self.0[7]
        )
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::GENESIS
    }
}

impl From<[u8; HASH_LENGTH]> for Hash {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// Data Classification
// ============================================================================

/// Sensitivity of a resource, ordered from least to most restricted.
///
/// | Level | Typical content | Extra controls |
/// |-------|-----------------|----------------|
/// | Public | Marketing material | none |
/// | Internal | Working documents | tenant boundary |
/// | Confidential | Client financials, contracts | signature authority 2 to sign |
/// | Restricted | Identity documents, health data, card data | MFA, signature authority 3 |
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataClassification {
    Public,
    #[default]
    Internal,
    Confidential,
    Restricted,
}

impl DataClassification {
    /// Numeric rank used for "at most"/"at least" comparisons.
    pub fn rank(self) -> u8 {
        match self {
            DataClassification::Public => 0,
            DataClassification::Internal => 1,
            DataClassification::Confidential => 2,
            DataClassification::Restricted => 3,
        }
    }
}

impl Display for DataClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataClassification::Public => "PUBLIC",
            DataClassification::Internal => "INTERNAL",
            DataClassification::Confidential => "CONFIDENTIAL",
            DataClassification::Restricted => "RESTRICTED",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Risk vocabulary
// ============================================================================

/// Severity of a risk factor or compliance finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Multiplier applied to `likelihood * impact` when scoring risk factors.
    pub fn multiplier(self) -> u32 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    /// Points deducted from a compliance score per finding of this severity.
    pub fn penalty(self) -> u32 {
        match self {
            Severity::Low => 5,
            Severity::Medium => 10,
            Severity::High => 20,
            Severity::Critical => 30,
        }
    }

    pub fn all() -> &'static [Severity] {
        &[
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ]
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Banded risk level derived from a 0-100 score.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Maps a score in `[0, 100]` to its band: <40 LOW, <60 MEDIUM, <80 HIGH, else CRITICAL.
    pub fn from_score(score: u32) -> Self {
        match score {
            0..40 => RiskLevel::Low,
            40..60 => RiskLevel::Medium,
            60..80 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn is_elevated(self) -> bool {
        self >= RiskLevel::High
    }
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => RiskLevel::Low,
            Severity::Medium => RiskLevel::Medium,
            Severity::High => RiskLevel::High,
            Severity::Critical => RiskLevel::Critical,
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("acme" ; "simple")]
    #[test_case("acme-corp_01" ; "with separators")]
    #[test_case("7" ; "single digit")]
    fn tenant_id_accepts_well_formed(raw: &str) {
        let id = TenantId::parse(raw).expect("valid tenant id");
        assert_eq!(id.as_str(), raw);
    }

    #[test_case("", IdentifierError::Empty ; "empty")]
    #[test_case("-acme", IdentifierError::InvalidStart ; "leading dash")]
    #[test_case("acme corp", IdentifierError::InvalidCharacter(' ') ; "space")]
    #[test_case("acme/../x", IdentifierError::InvalidCharacter('/') ; "path traversal")]
    fn tenant_id_rejects_malformed(raw: &str, expected: IdentifierError) {
        assert_eq!(TenantId::parse(raw), Err(expected));
    }

    #[test]
    fn tenant_id_rejects_overlong() {
        let raw = "a".repeat(MAX_TENANT_ID_LEN + 1);
        assert!(matches!(
            TenantId::parse(&raw),
            Err(IdentifierError::TooLong { len: 65, max: 64 })
        ));
    }

    #[test]
    fn tenant_id_deserialization_validates() {
        let ok: TenantId = serde_json::from_str("\"acme\"").unwrap();
        assert_eq!(ok.as_str(), "acme");
        assert!(serde_json::from_str::<TenantId>("\"not valid\"").is_err());
    }

    #[test]
    fn hash_genesis_is_zero() {
        assert!(Hash::GENESIS.is_genesis());
        assert!(!Hash::from_bytes([1u8; HASH_LENGTH]).is_genesis());
        assert_eq!(Hash::default(), Hash::GENESIS);
    }

    #[test]
    fn hash_display_is_full_hex() {
        let hash = Hash::from_bytes([0xab; HASH_LENGTH]);
        assert_eq!(hash.to_string(), "ab".repeat(HASH_LENGTH));
    }

    #[test]
    fn classification_ordering() {
        assert!(DataClassification::Public < DataClassification::Internal);
        assert!(DataClassification::Confidential < DataClassification::Restricted);
        assert_eq!(DataClassification::Restricted.rank(), 3);
    }

    #[test_case(0, RiskLevel::Low)]
    #[test_case(39, RiskLevel::Low)]
    #[test_case(40, RiskLevel::Medium)]
    #[test_case(59, RiskLevel::Medium)]
    #[test_case(60, RiskLevel::High)]
    #[test_case(79, RiskLevel::High)]
    #[test_case(80, RiskLevel::Critical)]
    #[test_case(100, RiskLevel::Critical)]
    fn risk_level_bands(score: u32, expected: RiskLevel) {
        assert_eq!(RiskLevel::from_score(score), expected);
    }

    #[test]
    fn severity_weights() {
        let multipliers: Vec<u32> = Severity::all().iter().map(|s| s.multiplier()).collect();
        assert_eq!(multipliers, vec![1, 2, 3, 4]);
        let penalties: Vec<u32> = Severity::all().iter().map(|s| s.penalty()).collect();
        assert_eq!(penalties, vec![5, 10, 20, 30]);
    }

    proptest! {
        #[test]
        fn flipping_any_bit_changes_hash(bytes in any::<[u8; 32]>(), bit in 0usize..256) {
            let hash = Hash::from_bytes(bytes);
            prop_assert_ne!(hash, hash.with_bit_flipped(bit));
            prop_assert_eq!(hash, hash.with_bit_flipped(bit).with_bit_flipped(bit));
        }
    }
}
