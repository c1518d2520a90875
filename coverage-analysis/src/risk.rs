use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::models::{LocationHazard, RiskFacts, RiskLevel};

/// External lookup of location risk facts, keyed by ZIP code.
///
/// Modeled as an external call: implementations may fail or be slow, and the
/// risk context stage absorbs both by falling back to [`RiskFacts::default_for`].
#[async_trait]
pub trait RiskDataSource: Send + Sync {
    async fn lookup(&self, zip_code: &str) -> Result<RiskFacts, CollaboratorError>;
}

impl RiskFacts {
    /// Defined default for unknown ZIP codes: low risk everywhere, never a
    /// failure.
    pub fn default_for(zip_code: &str) -> Self {
        Self {
            zip_code: zip_code.to_string(),
            flood: LocationHazard {
                zone: "X".to_string(),
                level: RiskLevel::Low,
                region: "Unknown".to_string(),
            },
            earthquake: LocationHazard {
                zone: "Stable".to_string(),
                level: RiskLevel::Low,
                region: "Unknown".to_string(),
            },
            crime_score: DEFAULT_CRIME_SCORE,
        }
    }
}

const DEFAULT_CRIME_SCORE: u8 = 4;

/// In-memory risk data source backed by static FEMA-style zone tables.
///
/// Read-only after construction, so it is safe to share across concurrent
/// requests behind an `Arc`.
pub struct StaticRiskDataSource {
    flood_zones: HashMap<&'static str, (&'static str, RiskLevel, &'static str)>,
    earthquake_zones: HashMap<&'static str, (&'static str, RiskLevel, &'static str)>,
    crime_scores: HashMap<&'static str, u8>,
}

impl StaticRiskDataSource {
    /// Build the source with the built-in demonstration zone tables.
    pub fn builtin() -> Self {
        let flood_zones = HashMap::from([
            // Coastal and river zones
            ("33139", ("AE", RiskLevel::High, "Miami, FL")),
            ("70112", ("AE", RiskLevel::High, "New Orleans, LA")),
            ("10002", ("A", RiskLevel::High, "New York, NY")),
            ("94102", ("X (protected)", RiskLevel::Medium, "San Francisco, CA")),
            ("77002", ("X (500-year)", RiskLevel::Medium, "Houston, TX")),
            ("02108", ("X (protected)", RiskLevel::Medium, "Boston, MA")),
            ("85001", ("X", RiskLevel::Low, "Phoenix, AZ")),
            ("80202", ("X", RiskLevel::Low, "Denver, CO")),
            ("60601", ("X", RiskLevel::Low, "Chicago, IL")),
            ("30303", ("X", RiskLevel::Low, "Atlanta, GA")),
        ]);

        let earthquake_zones = HashMap::from([
            ("94102", ("Alquist-Priolo", RiskLevel::High, "San Francisco, CA")),
            ("90001", ("Alquist-Priolo", RiskLevel::High, "Los Angeles, CA")),
            ("98101", ("Cascadia", RiskLevel::High, "Seattle, WA")),
            ("97201", ("Cascadia", RiskLevel::High, "Portland, OR")),
            ("84101", ("Wasatch", RiskLevel::Medium, "Salt Lake City, UT")),
            ("89101", ("Basin and Range", RiskLevel::Medium, "Las Vegas, NV")),
            ("33139", ("Stable", RiskLevel::Low, "Miami, FL")),
            ("60601", ("Stable", RiskLevel::Low, "Chicago, IL")),
            ("10002", ("Stable", RiskLevel::Low, "New York, NY")),
        ]);

        // 1-10 scale, 10 = highest crime
        let crime_scores = HashMap::from([
            ("10002", 7),
            ("90001", 8),
            ("60601", 6),
            ("33139", 5),
            ("94102", 7),
            ("85001", 6),
            ("30303", 7),
            ("02108", 4),
            ("98101", 5),
            ("80202", 5),
        ]);

        Self {
            flood_zones,
            earthquake_zones,
            crime_scores,
        }
    }

    fn facts_for(&self, zip_code: &str) -> RiskFacts {
        let mut facts = RiskFacts::default_for(zip_code);
        if let Some((zone, level, region)) = self.flood_zones.get(zip_code) {
            facts.flood = LocationHazard {
                zone: zone.to_string(),
                level: *level,
                region: region.to_string(),
            };
        }
        if let Some((zone, level, region)) = self.earthquake_zones.get(zip_code) {
            facts.earthquake = LocationHazard {
                zone: zone.to_string(),
                level: *level,
                region: region.to_string(),
            };
        }
        if let Some(score) = self.crime_scores.get(zip_code) {
            facts.crime_score = *score;
        }
        facts
    }
}

#[async_trait]
impl RiskDataSource for StaticRiskDataSource {
    async fn lookup(&self, zip_code: &str) -> Result<RiskFacts, CollaboratorError> {
        Ok(self.facts_for(zip_code))
    }
}
