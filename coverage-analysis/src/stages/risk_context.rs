use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{CustomerProfile, RiskFacts, RiskLevel, RiskProfile};
use crate::risk::RiskDataSource;
use crate::rules::HIGH_VALUE_HOME_THRESHOLD;
use crate::state::{AgentState, StateUpdate};

use super::Stage;

// Liability exposure breakpoints
const LIABILITY_NET_WORTH_LOW: u64 = 500_000;
const LIABILITY_NET_WORTH_MEDIUM: u64 = 1_000_000;
const LIABILITY_NET_WORTH_HIGH: u64 = 5_000_000;

// Crime score breakpoints (0-10 scale)
const CRIME_SCORE_HIGH: u8 = 8;
const CRIME_SCORE_MEDIUM: u8 = 6;
const CRIME_SCORE_LOW: u8 = 3;

/// Derives the customer's risk profile from location facts and profile
/// attributes.
///
/// The risk data lookup is an external call: on error or timeout the stage
/// falls back to default low-risk facts rather than failing.
pub struct RiskContextStage {
    source: Arc<dyn RiskDataSource>,
    lookup_timeout: Duration,
}

impl RiskContextStage {
    pub fn new(source: Arc<dyn RiskDataSource>, lookup_timeout: Duration) -> Self {
        Self {
            source,
            lookup_timeout,
        }
    }
}

#[async_trait]
impl Stage for RiskContextStage {
    fn name(&self) -> &'static str {
        "risk_context"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let customer = &state.policy_input.customer_profile;

        let facts = match tokio::time::timeout(
            self.lookup_timeout,
            self.source.lookup(&customer.zip_code),
        )
        .await
        {
            Ok(Ok(facts)) => facts,
            Ok(Err(e)) => {
                warn!(zip_code = %customer.zip_code, error = %e,
                    "risk data source unavailable, using default facts");
                RiskFacts::default_for(&customer.zip_code)
            }
            Err(_) => {
                warn!(zip_code = %customer.zip_code,
                    "risk data lookup timed out, using default facts");
                RiskFacts::default_for(&customer.zip_code)
            }
        };

        let risk_profile = derive_risk_profile(customer, facts);
        let risk_factors = build_risk_factors(customer, &risk_profile);

        debug!(
            zip_code = %customer.zip_code,
            flood = %risk_profile.flood,
            earthquake = %risk_profile.earthquake,
            crime = %risk_profile.crime,
            liability = %risk_profile.liability_exposure,
            factors = risk_factors.len(),
            "risk context complete"
        );

        Ok(StateUpdate::RiskAssessed {
            risk_profile,
            risk_factors,
        })
    }
}

/// Map raw facts and profile attributes onto per-category levels using fixed
/// numeric breakpoints.
pub fn derive_risk_profile(customer: &CustomerProfile, facts: RiskFacts) -> RiskProfile {
    let crime = match facts.crime_score {
        s if s >= CRIME_SCORE_HIGH => RiskLevel::High,
        s if s >= CRIME_SCORE_MEDIUM => RiskLevel::Medium,
        s if s >= CRIME_SCORE_LOW => RiskLevel::Low,
        _ => RiskLevel::None,
    };

    let mut liability_exposure = match customer.net_worth {
        n if n > LIABILITY_NET_WORTH_HIGH => RiskLevel::High,
        n if n > LIABILITY_NET_WORTH_MEDIUM => RiskLevel::Medium,
        n if n > LIABILITY_NET_WORTH_LOW => RiskLevel::Low,
        _ => RiskLevel::None,
    };
    if customer.home_value > HIGH_VALUE_HOME_THRESHOLD {
        liability_exposure = liability_exposure.escalate();
    }

    RiskProfile {
        flood: facts.flood.level,
        earthquake: facts.earthquake.level,
        crime,
        liability_exposure,
        facts,
    }
}

/// One statement per non-None risk category in fixed precedence order
/// (flood, earthquake, crime, liability exposure), then categorical factors
/// from profile flags. Deterministic for identical input.
pub fn build_risk_factors(customer: &CustomerProfile, risk: &RiskProfile) -> Vec<String> {
    let mut factors = Vec::new();

    if risk.flood != RiskLevel::None {
        factors.push(format!(
            "{} flood risk - FEMA zone {}",
            risk.flood, risk.facts.flood.zone
        ));
    }
    if risk.earthquake != RiskLevel::None {
        factors.push(format!(
            "{} earthquake risk - {} zone",
            risk.earthquake, risk.facts.earthquake.zone
        ));
    }
    if risk.crime != RiskLevel::None {
        factors.push(format!(
            "{} crime area (score: {}/10)",
            risk.crime, risk.facts.crime_score
        ));
    }
    if risk.liability_exposure != RiskLevel::None {
        factors.push(format!(
            "{} liability exposure (net worth ${})",
            risk.liability_exposure, customer.net_worth
        ));
    }

    if customer.additional_properties > 0 {
        factors.push(format!(
            "Owns {} additional propert(ies)",
            customer.additional_properties
        ));
    }
    if customer.has_watercraft {
        factors.push("Owns watercraft - specialized coverage needed".to_string());
    }
    if customer.has_high_value_items {
        factors.push("Owns high-value items - enhanced coverage recommended".to_string());
    }

    factors
}
