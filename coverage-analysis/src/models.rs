use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Types of insurance coverage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CoverageType {
    Auto,
    Home,
    Umbrella,
    Flood,
    Earthquake,
    Jewelry,
    Watercraft,
    Renters,
}

impl CoverageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageType::Auto => "auto",
            CoverageType::Home => "home",
            CoverageType::Umbrella => "umbrella",
            CoverageType::Flood => "flood",
            CoverageType::Earthquake => "earthquake",
            CoverageType::Jewelry => "jewelry",
            CoverageType::Watercraft => "watercraft",
            CoverageType::Renters => "renters",
        }
    }
}

impl fmt::Display for CoverageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an identified coverage gap.
///
/// Declaration order doubles as presentation order: High sorts first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => f.write_str("High"),
            Severity::Medium => f.write_str("Medium"),
            Severity::Low => f.write_str("Low"),
        }
    }
}

/// Qualitative risk level for a single risk category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bump the level one step, saturating at High.
    pub fn escalate(self) -> Self {
        match self {
            RiskLevel::None => RiskLevel::Low,
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium | RiskLevel::High => RiskLevel::High,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::None => f.write_str("None"),
            RiskLevel::Low => f.write_str("Low"),
            RiskLevel::Medium => f.write_str("Medium"),
            RiskLevel::High => f.write_str("High"),
        }
    }
}

/// An existing coverage on the input policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageItem {
    pub coverage_type: CoverageType,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub deductible: u64,
    #[serde(default)]
    pub premium: f64,
}

/// Customer profile and self-reported risk attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub name: String,
    pub zip_code: String,
    #[serde(default)]
    pub net_worth: u64,
    #[serde(default)]
    pub home_value: u64,
    #[serde(default)]
    pub additional_properties: u32,
    #[serde(default)]
    pub has_watercraft: bool,
    #[serde(default)]
    pub has_high_value_items: bool,
}

/// Input policy record. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyInput {
    pub policy_number: String,
    pub customer_profile: CustomerProfile,
    #[serde(default)]
    pub existing_coverages: Vec<CoverageItem>,
}

impl PolicyInput {
    /// Validate the minimum required fields. An empty coverage list is valid
    /// (a bare policy must still be analyzable).
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.policy_number.trim().is_empty() {
            return Err(AnalysisError::InvalidInput(
                "policy_number must not be empty".to_string(),
            ));
        }
        if self.customer_profile.name.trim().is_empty() {
            return Err(AnalysisError::InvalidInput(
                "customer_profile.name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-coverage-type summary entry produced by the policy analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub limit: u64,
    pub deductible: u64,
    pub premium: f64,
}

/// Map of distinct coverage types present on the policy to their summary.
pub type CoverageSummaryMap = BTreeMap<CoverageType, CoverageSummary>;

/// Location hazard facts for one peril (flood or earthquake).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHazard {
    pub zone: String,
    pub level: RiskLevel,
    pub region: String,
}

/// Raw location facts returned by the risk data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFacts {
    pub zip_code: String,
    pub flood: LocationHazard,
    pub earthquake: LocationHazard,
    /// Crime score on a 0-10 scale, 10 being highest crime.
    pub crime_score: u8,
}

/// Derived qualitative risk levels per category plus the underlying facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub flood: RiskLevel,
    pub earthquake: RiskLevel,
    pub crime: RiskLevel,
    pub liability_exposure: RiskLevel,
    pub facts: RiskFacts,
}

/// A pre-deduplication recommendation produced by the rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecommendation {
    pub coverage_type: CoverageType,
    pub recommended_limit: u64,
    pub rule_ids: Vec<String>,
    pub rationale: Vec<String>,
    pub informational: bool,
    /// Index of the earliest contributing rule in the catalog, used for
    /// deterministic presentation ordering.
    pub catalog_index: usize,
}

/// Final, immutable output unit of the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub gap_type: CoverageType,
    pub severity: Severity,
    pub title: String,
    pub explanation: String,
    pub recommendation: String,
    pub estimated_annual_premium: f64,
    pub risk_factors: Vec<String>,
}

/// Terminal analysis result returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub policy_number: String,
    pub customer_name: String,
    pub total_gaps_found: usize,
    pub coverage_gaps: Vec<CoverageGap>,
    pub total_estimated_premium_impact: f64,
    pub analysis_summary: String,
}

/// Round a currency amount to whole cents.
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
