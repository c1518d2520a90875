use crate::models::{CoverageType, CustomerProfile, RiskLevel, RiskProfile};

// Umbrella thresholds
pub const UMBRELLA_NET_WORTH_THRESHOLD: u64 = 500_000;
pub const UMBRELLA_LIMIT_FLOOR: u64 = 1_000_000;
pub const UMBRELLA_LIMIT_CAP: u64 = 5_000_000;

// Liability exposure from property holdings
pub const HIGH_VALUE_HOME_THRESHOLD: u64 = 500_000;
pub const LIABILITY_RECOMMENDED_LIMIT: u64 = 1_000_000;

pub const FLOOD_COVERAGE_LIMIT: u64 = 250_000;
pub const EARTHQUAKE_LIMIT_FLOOR: u64 = 300_000;

// Home insurance coverage-to-value ratio, 80% minimum
pub const HOME_COVERAGE_TO_VALUE_MIN: f64 = 0.80;

pub const WATERCRAFT_COVERAGE_LIMIT: u64 = 100_000;
pub const JEWELRY_COVERAGE_LIMIT: u64 = 50_000;
pub const RENTAL_DWELLING_LIMIT: u64 = 300_000;

type RulePredicate = fn(&CustomerProfile, &RiskProfile) -> bool;
type RuleLimit = fn(&CustomerProfile, &RiskProfile) -> u64;
type RuleRationale = fn(&CustomerProfile, &RiskProfile) -> Vec<String>;

/// A static catalog entry: "if this condition holds, recommend coverage X at
/// limit Y". Never mutated at runtime.
///
/// A rule fires when `applies` holds and the targeted coverage type is either
/// absent from the policy or present with a limit below `minimum_limit`.
pub struct UnderwritingRule {
    pub id: &'static str,
    pub coverage_type: CoverageType,
    pub description: &'static str,
    /// Informational rules surface as Low-severity advisories.
    pub informational: bool,
    pub applies: RulePredicate,
    pub minimum_limit: RuleLimit,
    pub recommended_limit: RuleLimit,
    pub rationale: RuleRationale,
}

/// Immutable, injectable rule catalog. Safe for concurrent read-only access.
pub struct RuleCatalog {
    rules: Vec<UnderwritingRule>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<UnderwritingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[UnderwritingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The built-in underwriting catalog, in declaration (evaluation) order.
    pub fn builtin() -> Self {
        Self::new(vec![
            UnderwritingRule {
                id: "UMBRELLA_001",
                coverage_type: CoverageType::Umbrella,
                description: "Umbrella policy recommended for individuals with substantial net worth",
                informational: false,
                applies: |customer, _risk| customer.net_worth >= UMBRELLA_NET_WORTH_THRESHOLD,
                minimum_limit: umbrella_limit,
                recommended_limit: umbrella_limit,
                rationale: |customer, _risk| {
                    vec![
                        format!(
                            "Net worth of ${} requires additional liability protection",
                            customer.net_worth
                        ),
                        "Asset protection needed beyond base policy limits".to_string(),
                    ]
                },
            },
            UnderwritingRule {
                id: "LIABILITY_001",
                coverage_type: CoverageType::Umbrella,
                description: "Excess liability recommended for high-value or multiple properties",
                informational: false,
                applies: |customer, _risk| {
                    customer.home_value > HIGH_VALUE_HOME_THRESHOLD
                        || customer.additional_properties > 0
                },
                minimum_limit: |_customer, _risk| LIABILITY_RECOMMENDED_LIMIT,
                recommended_limit: |_customer, _risk| LIABILITY_RECOMMENDED_LIMIT,
                rationale: |customer, _risk| {
                    let mut facts = Vec::new();
                    if customer.home_value > HIGH_VALUE_HOME_THRESHOLD {
                        facts.push(format!(
                            "High-value property (${}) increases liability exposure",
                            customer.home_value
                        ));
                    }
                    if customer.additional_properties > 0 {
                        facts.push(format!(
                            "Owns {} additional propert(ies)",
                            customer.additional_properties
                        ));
                    }
                    facts
                },
            },
            UnderwritingRule {
                id: "FLOOD_001",
                coverage_type: CoverageType::Flood,
                description: "Flood insurance required for properties in elevated flood zones",
                informational: false,
                applies: |_customer, risk| risk.flood >= RiskLevel::Medium,
                minimum_limit: |_customer, _risk| FLOOD_COVERAGE_LIMIT,
                recommended_limit: |_customer, _risk| FLOOD_COVERAGE_LIMIT,
                rationale: |_customer, risk| {
                    vec![
                        format!(
                            "Property located in FEMA flood zone {} ({})",
                            risk.facts.flood.zone, risk.facts.flood.region
                        ),
                        format!("{} flood risk", risk.flood),
                    ]
                },
            },
            UnderwritingRule {
                id: "EARTHQUAKE_001",
                coverage_type: CoverageType::Earthquake,
                description: "Earthquake insurance recommended for properties in seismic zones",
                informational: false,
                applies: |_customer, risk| risk.earthquake >= RiskLevel::Medium,
                minimum_limit: earthquake_limit,
                recommended_limit: earthquake_limit,
                rationale: |_customer, risk| {
                    vec![
                        format!(
                            "Property located in {} seismic zone ({})",
                            risk.facts.earthquake.zone, risk.facts.earthquake.region
                        ),
                        format!("{} earthquake risk", risk.earthquake),
                    ]
                },
            },
            UnderwritingRule {
                id: "HOME_VALUE_001",
                coverage_type: CoverageType::Home,
                description: "Dwelling coverage should be at least 80% of home value",
                informational: false,
                applies: |customer, _risk| customer.home_value > 0,
                minimum_limit: |customer, _risk| {
                    (customer.home_value as f64 * HOME_COVERAGE_TO_VALUE_MIN).ceil() as u64
                },
                recommended_limit: |customer, _risk| customer.home_value,
                rationale: |customer, _risk| {
                    vec![format!(
                        "Home value of ${} requires dwelling coverage of at least ${}",
                        customer.home_value,
                        (customer.home_value as f64 * HOME_COVERAGE_TO_VALUE_MIN).ceil() as u64
                    )]
                },
            },
            UnderwritingRule {
                id: "WATERCRAFT_001",
                coverage_type: CoverageType::Watercraft,
                description: "Watercraft liability and hull coverage for boat owners",
                informational: false,
                applies: |customer, _risk| customer.has_watercraft,
                minimum_limit: |_customer, _risk| WATERCRAFT_COVERAGE_LIMIT,
                recommended_limit: |_customer, _risk| WATERCRAFT_COVERAGE_LIMIT,
                rationale: |_customer, _risk| {
                    vec!["Owns watercraft - liability and hull coverage needed".to_string()]
                },
            },
            UnderwritingRule {
                id: "JEWELRY_001",
                coverage_type: CoverageType::Jewelry,
                description: "Scheduled coverage for jewelry and other high-value possessions",
                informational: false,
                applies: |customer, _risk| customer.has_high_value_items,
                minimum_limit: |_customer, _risk| JEWELRY_COVERAGE_LIMIT,
                recommended_limit: |_customer, _risk| JEWELRY_COVERAGE_LIMIT,
                rationale: |_customer, _risk| {
                    vec![
                        "Owns high-value items (jewelry, art, collectibles)".to_string(),
                        "Standard home policy limits insufficient for scheduled items".to_string(),
                    ]
                },
            },
            UnderwritingRule {
                id: "RENTAL_001",
                coverage_type: CoverageType::Renters,
                description: "Dwelling coverage review advised for additional properties",
                informational: true,
                applies: |customer, _risk| customer.additional_properties > 0,
                minimum_limit: |_customer, _risk| RENTAL_DWELLING_LIMIT,
                recommended_limit: |_customer, _risk| RENTAL_DWELLING_LIMIT,
                rationale: |customer, _risk| {
                    vec![format!(
                        "Owns {} additional propert(ies) - dwelling coverage review recommended",
                        customer.additional_properties
                    )]
                },
            },
        ])
    }
}

fn umbrella_limit(customer: &CustomerProfile, _risk: &RiskProfile) -> u64 {
    customer
        .net_worth
        .clamp(UMBRELLA_LIMIT_FLOOR, UMBRELLA_LIMIT_CAP)
}

fn earthquake_limit(customer: &CustomerProfile, _risk: &RiskProfile) -> u64 {
    customer.home_value.max(EARTHQUAKE_LIMIT_FLOOR)
}
