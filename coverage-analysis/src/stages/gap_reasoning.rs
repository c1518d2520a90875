use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::llm::{NarrativeGenerator, PromptContext};
use crate::models::{
    CandidateRecommendation, CoverageGap, CoverageSummaryMap, CoverageType, CustomerProfile,
    RiskLevel, RiskProfile, Severity, round_to_cents,
};
use crate::state::{AgentState, StateUpdate};

use super::Stage;

// Premium rates per $1,000 of recommended limit
const UMBRELLA_RATE_PER_K: f64 = 0.20;
const UMBRELLA_MIN_PREMIUM: f64 = 150.0;
const FLOOD_HIGH_RATE_PER_K: f64 = 10.0;
const FLOOD_MEDIUM_RATE_PER_K: f64 = 3.2;
const FLOOD_LOW_RATE_PER_K: f64 = 1.6;
const EARTHQUAKE_HIGH_RATE_PER_K: f64 = 6.0;
const EARTHQUAKE_MEDIUM_RATE_PER_K: f64 = 2.0;
const EARTHQUAKE_LOW_RATE_PER_K: f64 = 1.0;
const HOME_RATE_PER_K: f64 = 3.5;
const WATERCRAFT_RATE_PER_K: f64 = 5.0;
const JEWELRY_RATE_PER_K: f64 = 4.0;
const RENTERS_RATE_PER_K: f64 = 1.0;
const AUTO_RATE_PER_K: f64 = 8.0;

/// Synthesizes the final ranked gap list from the candidate recommendations.
///
/// Severity and premium figures are pure deterministic computations; only the
/// explanation narrative goes through the external LLM collaborator, and a
/// deterministic template stands in whenever that collaborator fails, times
/// out, or returns an empty response.
pub struct GapReasoningStage {
    generator: Arc<dyn NarrativeGenerator>,
    generate_timeout: Duration,
    high_net_worth_threshold: u64,
}

impl GapReasoningStage {
    pub fn new(
        generator: Arc<dyn NarrativeGenerator>,
        generate_timeout: Duration,
        high_net_worth_threshold: u64,
    ) -> Self {
        Self {
            generator,
            generate_timeout,
            high_net_worth_threshold,
        }
    }

    async fn explanation_for(&self, context: &PromptContext, candidate: &CandidateRecommendation) -> String {
        match tokio::time::timeout(self.generate_timeout, self.generator.generate(context)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => {
                warn!(coverage_type = %candidate.coverage_type,
                    "narrative collaborator returned empty response, using fallback template");
                fallback_explanation(candidate)
            }
            Ok(Err(e)) => {
                warn!(coverage_type = %candidate.coverage_type, error = %e,
                    "narrative collaborator unavailable, using fallback template");
                fallback_explanation(candidate)
            }
            Err(_) => {
                warn!(coverage_type = %candidate.coverage_type,
                    "narrative collaborator timed out, using fallback template");
                fallback_explanation(candidate)
            }
        }
    }
}

#[async_trait]
impl Stage for GapReasoningStage {
    fn name(&self) -> &'static str {
        "gap_reasoning"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let candidates = state.underwriting_recommendations()?;
        let summary = state.existing_coverages_summary()?;
        let risk = state.risk_profile()?;
        let customer = &state.policy_input.customer_profile;

        if candidates.is_empty() {
            debug!("no candidate recommendations, no gaps to report");
            return Ok(StateUpdate::GapsReasoned {
                coverage_gaps: vec![],
            });
        }

        let mut ordered: Vec<(usize, CoverageGap)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let severity =
                assign_severity(candidate, customer, risk, self.high_net_worth_threshold);
            let premium = estimate_annual_premium(candidate, summary, risk);
            let title = gap_title(candidate.coverage_type);

            let context = PromptContext::from_customer(
                customer,
                candidate.coverage_type,
                &title,
                severity,
                candidate.recommended_limit,
                &candidate.rationale,
            );
            let explanation = self.explanation_for(&context, candidate).await;

            ordered.push((
                candidate.catalog_index,
                CoverageGap {
                    gap_type: candidate.coverage_type,
                    severity,
                    title,
                    explanation,
                    recommendation: recommendation_text(candidate, premium),
                    estimated_annual_premium: premium,
                    risk_factors: candidate.rationale.clone(),
                },
            ));
        }

        // Severity first, then catalog order, ties by coverage type name.
        ordered.sort_by(|(a_idx, a), (b_idx, b)| {
            a.severity
                .cmp(&b.severity)
                .then(a_idx.cmp(b_idx))
                .then(a.gap_type.as_str().cmp(b.gap_type.as_str()))
        });
        let coverage_gaps: Vec<CoverageGap> = ordered.into_iter().map(|(_, gap)| gap).collect();

        debug!(gaps = coverage_gaps.len(), "gap reasoning complete");
        Ok(StateUpdate::GapsReasoned { coverage_gaps })
    }
}

/// Deterministic severity policy: informational rules are Low; a quantifiable
/// exposure past a hard threshold (High location risk for the relevant peril,
/// or net worth strictly above the high-net-worth threshold for liability
/// gaps) is High; everything else is Medium.
pub fn assign_severity(
    candidate: &CandidateRecommendation,
    customer: &CustomerProfile,
    risk: &RiskProfile,
    high_net_worth_threshold: u64,
) -> Severity {
    if candidate.informational {
        return Severity::Low;
    }
    let location_high = match candidate.coverage_type {
        CoverageType::Flood => risk.flood == RiskLevel::High,
        CoverageType::Earthquake => risk.earthquake == RiskLevel::High,
        _ => false,
    };
    let net_worth_high = candidate.coverage_type == CoverageType::Umbrella
        && customer.net_worth > high_net_worth_threshold;
    if location_high || net_worth_high {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Pure premium estimate: a coverage-type-specific rate per $1,000 of
/// recommended limit, parameterized by the relevant risk level, rounded to
/// cents.
pub fn estimate_annual_premium(
    candidate: &CandidateRecommendation,
    summary: &CoverageSummaryMap,
    risk: &RiskProfile,
) -> f64 {
    let limit_k = candidate.recommended_limit as f64 / 1_000.0;
    let premium = match candidate.coverage_type {
        CoverageType::Umbrella => (limit_k * UMBRELLA_RATE_PER_K).max(UMBRELLA_MIN_PREMIUM),
        CoverageType::Flood => {
            let rate = match risk.flood {
                RiskLevel::High => FLOOD_HIGH_RATE_PER_K,
                RiskLevel::Medium => FLOOD_MEDIUM_RATE_PER_K,
                _ => FLOOD_LOW_RATE_PER_K,
            };
            limit_k * rate
        }
        CoverageType::Earthquake => {
            let rate = match risk.earthquake {
                RiskLevel::High => EARTHQUAKE_HIGH_RATE_PER_K,
                RiskLevel::Medium => EARTHQUAKE_MEDIUM_RATE_PER_K,
                _ => EARTHQUAKE_LOW_RATE_PER_K,
            };
            limit_k * rate
        }
        CoverageType::Home => {
            // Rated on the limit shortfall: what must be added on top of the
            // existing dwelling limit.
            let existing = summary
                .get(&CoverageType::Home)
                .map(|c| c.limit)
                .unwrap_or(0);
            let shortfall = candidate.recommended_limit.saturating_sub(existing);
            (shortfall as f64 / 1_000.0) * HOME_RATE_PER_K
        }
        CoverageType::Watercraft => limit_k * WATERCRAFT_RATE_PER_K,
        CoverageType::Jewelry => limit_k * JEWELRY_RATE_PER_K,
        CoverageType::Renters => limit_k * RENTERS_RATE_PER_K,
        CoverageType::Auto => limit_k * AUTO_RATE_PER_K,
    };
    round_to_cents(premium)
}

fn gap_title(coverage_type: CoverageType) -> String {
    match coverage_type {
        CoverageType::Umbrella => "Missing Umbrella Liability Protection",
        CoverageType::Flood => "Flood Insurance Coverage Gap",
        CoverageType::Earthquake => "Earthquake Coverage Not Included",
        CoverageType::Watercraft => "Watercraft Liability Exposure",
        CoverageType::Jewelry => "High-Value Items Underinsured",
        CoverageType::Home => "Home Underinsured Relative to Value",
        CoverageType::Renters => "Rental Property Coverage Review",
        CoverageType::Auto => "Missing Auto Coverage",
    }
    .to_string()
}

/// Deterministic explanation built only from rationale facts; stands in when
/// the narrative collaborator is unavailable.
fn fallback_explanation(candidate: &CandidateRecommendation) -> String {
    let reason = if candidate.rationale.is_empty() {
        "Coverage gap identified".to_string()
    } else {
        candidate.rationale.join("; ")
    };
    match candidate.coverage_type {
        CoverageType::Umbrella => format!(
            "Your current liability coverage may not adequately protect your assets. {reason}. \
             Without umbrella coverage, you could be personally liable for damages exceeding \
             your policy limits."
        ),
        CoverageType::Flood => format!(
            "Standard homeowner policies don't cover flood damage. {reason}. Flood insurance \
             is essential to protect your property investment."
        ),
        CoverageType::Earthquake => format!(
            "Your home insurance policy excludes earthquake damage. {reason}. Earthquake \
             insurance protects your home's structure and contents from seismic events."
        ),
        _ => format!("{reason}. This coverage gap could leave you financially exposed."),
    }
}

fn recommendation_text(candidate: &CandidateRecommendation, premium: f64) -> String {
    format!(
        "We recommend adding {} coverage with a ${} limit. Estimated annual premium: ${:.2}.",
        candidate.coverage_type, candidate.recommended_limit, premium
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::models::{CoverageSummary, RiskFacts};
    use crate::stages::risk_context::derive_risk_profile;

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl NarrativeGenerator for FixedGenerator {
        async fn generate(
            &self,
            _context: &PromptContext,
        ) -> std::result::Result<String, CollaboratorError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl NarrativeGenerator for FailingGenerator {
        async fn generate(
            &self,
            _context: &PromptContext,
        ) -> std::result::Result<String, CollaboratorError> {
            Err(CollaboratorError::Unavailable("llm down".to_string()))
        }
    }

    fn customer(net_worth: u64) -> CustomerProfile {
        CustomerProfile {
            name: "Jane Doe".to_string(),
            zip_code: "99999".to_string(),
            net_worth,
            home_value: 0,
            additional_properties: 0,
            has_watercraft: false,
            has_high_value_items: false,
        }
    }

    fn umbrella_candidate(limit: u64) -> CandidateRecommendation {
        CandidateRecommendation {
            coverage_type: CoverageType::Umbrella,
            recommended_limit: limit,
            rule_ids: vec!["UMBRELLA_001".to_string()],
            rationale: vec!["Net worth requires additional liability protection".to_string()],
            informational: false,
            catalog_index: 0,
        }
    }

    fn risk_for(customer: &CustomerProfile) -> RiskProfile {
        derive_risk_profile(customer, RiskFacts::default_for(&customer.zip_code))
    }

    #[test]
    fn severity_is_high_only_above_net_worth_threshold() {
        let threshold = 1_000_000;
        let candidate = umbrella_candidate(2_000_000);

        let above = customer(threshold + 1);
        let risk = risk_for(&above);
        assert_eq!(
            assign_severity(&candidate, &above, &risk, threshold),
            Severity::High
        );

        let below = customer(threshold - 1);
        let risk = risk_for(&below);
        assert_eq!(
            assign_severity(&candidate, &below, &risk, threshold),
            Severity::Medium
        );

        let exact = customer(threshold);
        let risk = risk_for(&exact);
        assert_eq!(
            assign_severity(&candidate, &exact, &risk, threshold),
            Severity::Medium
        );
    }

    #[test]
    fn informational_candidates_are_low_severity() {
        let candidate = CandidateRecommendation {
            coverage_type: CoverageType::Renters,
            recommended_limit: 300_000,
            rule_ids: vec!["RENTAL_001".to_string()],
            rationale: vec![],
            informational: true,
            catalog_index: 7,
        };
        let customer = customer(10_000_000);
        let risk = risk_for(&customer);
        assert_eq!(
            assign_severity(&candidate, &customer, &risk, 1_000_000),
            Severity::Low
        );
    }

    #[test]
    fn umbrella_premium_is_rate_per_thousand_with_floor() {
        let customer = customer(2_500_000);
        let risk = risk_for(&customer);
        let summary = CoverageSummaryMap::new();
        assert_eq!(
            estimate_annual_premium(&umbrella_candidate(2_500_000), &summary, &risk),
            500.00
        );
        assert_eq!(
            estimate_annual_premium(&umbrella_candidate(100_000), &summary, &risk),
            150.00
        );
    }

    #[test]
    fn flood_premium_depends_on_risk_level() {
        let customer = customer(0);
        let mut risk = risk_for(&customer);
        let summary = CoverageSummaryMap::new();
        let candidate = CandidateRecommendation {
            coverage_type: CoverageType::Flood,
            recommended_limit: 250_000,
            rule_ids: vec!["FLOOD_001".to_string()],
            rationale: vec![],
            informational: false,
            catalog_index: 2,
        };

        risk.flood = RiskLevel::High;
        assert_eq!(estimate_annual_premium(&candidate, &summary, &risk), 2500.00);
        risk.flood = RiskLevel::Medium;
        assert_eq!(estimate_annual_premium(&candidate, &summary, &risk), 800.00);
    }

    #[test]
    fn home_premium_is_rated_on_the_shortfall() {
        let customer = customer(0);
        let risk = risk_for(&customer);
        let mut summary = CoverageSummaryMap::new();
        summary.insert(
            CoverageType::Home,
            CoverageSummary {
                limit: 300_000,
                deductible: 1_000,
                premium: 1_200.0,
            },
        );
        let candidate = CandidateRecommendation {
            coverage_type: CoverageType::Home,
            recommended_limit: 450_000,
            rule_ids: vec!["HOME_VALUE_001".to_string()],
            rationale: vec![],
            informational: false,
            catalog_index: 4,
        };
        // 150k shortfall at 3.5 per $1,000
        assert_eq!(estimate_annual_premium(&candidate, &summary, &risk), 525.00);
    }

    fn stage_state(
        candidates: Vec<CandidateRecommendation>,
        net_worth: u64,
    ) -> AgentState {
        use crate::models::PolicyInput;
        let customer = customer(net_worth);
        let risk = risk_for(&customer);
        let mut state = AgentState::new(PolicyInput {
            policy_number: "POL-1".to_string(),
            customer_profile: customer,
            existing_coverages: vec![],
        });
        state
            .apply(StateUpdate::PolicyAnalyzed {
                policy_summary: "summary".to_string(),
                existing_coverages_summary: CoverageSummaryMap::new(),
            })
            .unwrap();
        state
            .apply(StateUpdate::RiskAssessed {
                risk_profile: risk,
                risk_factors: vec![],
            })
            .unwrap();
        state
            .apply(StateUpdate::RulesApplied {
                recommendations: candidates,
            })
            .unwrap();
        state
    }

    #[tokio::test]
    async fn failing_generator_falls_back_to_template() {
        let stage = GapReasoningStage::new(
            Arc::new(FailingGenerator),
            Duration::from_secs(1),
            1_000_000,
        );
        let state = stage_state(vec![umbrella_candidate(2_000_000)], 2_000_000);
        let update = stage.run(&state).await.unwrap();
        let StateUpdate::GapsReasoned { coverage_gaps } = update else {
            panic!("wrong update variant");
        };
        assert_eq!(coverage_gaps.len(), 1);
        assert!(
            coverage_gaps[0]
                .explanation
                .contains("umbrella coverage")
        );
    }

    #[tokio::test]
    async fn gaps_are_sorted_by_severity_then_catalog_order() {
        let stage = GapReasoningStage::new(
            Arc::new(FixedGenerator("narrative text")),
            Duration::from_secs(1),
            1_000_000,
        );
        let informational = CandidateRecommendation {
            coverage_type: CoverageType::Renters,
            recommended_limit: 300_000,
            rule_ids: vec!["RENTAL_001".to_string()],
            rationale: vec![],
            informational: true,
            catalog_index: 7,
        };
        let jewelry = CandidateRecommendation {
            coverage_type: CoverageType::Jewelry,
            recommended_limit: 50_000,
            rule_ids: vec!["JEWELRY_001".to_string()],
            rationale: vec![],
            informational: false,
            catalog_index: 6,
        };
        let state = stage_state(
            vec![umbrella_candidate(2_000_000), jewelry, informational],
            2_000_000,
        );
        let update = stage.run(&state).await.unwrap();
        let StateUpdate::GapsReasoned { coverage_gaps } = update else {
            panic!("wrong update variant");
        };
        let order: Vec<(CoverageType, Severity)> = coverage_gaps
            .iter()
            .map(|g| (g.gap_type, g.severity))
            .collect();
        assert_eq!(
            order,
            vec![
                (CoverageType::Umbrella, Severity::High),
                (CoverageType::Jewelry, Severity::Medium),
                (CoverageType::Renters, Severity::Low),
            ]
        );
        assert_eq!(coverage_gaps[0].explanation, "narrative text");
    }
}
