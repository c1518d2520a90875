pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod risk;
pub mod rules;
pub mod stages;
pub mod state;

// Re-export commonly used types
pub use config::AnalysisConfig;
pub use error::{AnalysisError, CollaboratorError, Result};
pub use llm::{NarrativeGenerator, PromptContext, UnavailableNarrativeGenerator};
pub use models::{
    AnalysisResult, CandidateRecommendation, CoverageGap, CoverageItem, CoverageSummary,
    CoverageType, CustomerProfile, PolicyInput, RiskFacts, RiskLevel, RiskProfile, Severity,
};
pub use pipeline::Orchestrator;
pub use risk::{RiskDataSource, StaticRiskDataSource};
pub use rules::{RuleCatalog, UnderwritingRule};
pub use state::{AgentState, Phase, StateUpdate};

#[cfg(feature = "rig")]
pub use llm::RigNarrativeGenerator;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedGenerator;

    #[async_trait]
    impl NarrativeGenerator for FixedGenerator {
        async fn generate(
            &self,
            context: &PromptContext,
        ) -> std::result::Result<String, CollaboratorError> {
            Ok(format!("Deterministic narrative for {}.", context.coverage_type))
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl NarrativeGenerator for SlowGenerator {
        async fn generate(
            &self,
            _context: &PromptContext,
        ) -> std::result::Result<String, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
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

    fn orchestrator(generator: Arc<dyn NarrativeGenerator>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(RuleCatalog::builtin()),
            Arc::new(StaticRiskDataSource::builtin()),
            generator,
            AnalysisConfig::default(),
        )
    }

    fn miami_high_net_worth_policy() -> PolicyInput {
        PolicyInput {
            policy_number: "POL-MIA-001".to_string(),
            customer_profile: CustomerProfile {
                name: "Maria Alvarez".to_string(),
                zip_code: "33139".to_string(),
                net_worth: 2_500_000,
                home_value: 450_000,
                additional_properties: 0,
                has_watercraft: false,
                has_high_value_items: false,
            },
            existing_coverages: vec![CoverageItem {
                coverage_type: CoverageType::Home,
                limit: 400_000,
                deductible: 2_500,
                premium: 2_100.0,
            }],
        }
    }

    fn well_covered_policy() -> PolicyInput {
        PolicyInput {
            policy_number: "POL-CHI-002".to_string(),
            customer_profile: CustomerProfile {
                name: "Sam Lee".to_string(),
                zip_code: "60601".to_string(),
                net_worth: 400_000,
                home_value: 300_000,
                additional_properties: 0,
                has_watercraft: false,
                has_high_value_items: false,
            },
            existing_coverages: vec![
                CoverageItem {
                    coverage_type: CoverageType::Home,
                    limit: 300_000,
                    deductible: 1_000,
                    premium: 1_400.0,
                },
                CoverageItem {
                    coverage_type: CoverageType::Auto,
                    limit: 100_000,
                    deductible: 500,
                    premium: 950.0,
                },
            ],
        }
    }

    #[tokio::test]
    async fn miami_scenario_produces_umbrella_and_flood_gaps() {
        let orchestrator = orchestrator(Arc::new(FixedGenerator));
        let result = orchestrator
            .analyze(miami_high_net_worth_policy())
            .await
            .unwrap();

        assert_eq!(result.total_gaps_found, 2);
        let types: Vec<CoverageType> = result.coverage_gaps.iter().map(|g| g.gap_type).collect();
        assert_eq!(types, vec![CoverageType::Umbrella, CoverageType::Flood]);
        assert!(result.coverage_gaps.iter().all(|g| g.severity == Severity::High));

        let premiums: Vec<f64> = result
            .coverage_gaps
            .iter()
            .map(|g| g.estimated_annual_premium)
            .collect();
        assert_eq!(premiums, vec![500.00, 2500.00]);
        assert_eq!(result.total_estimated_premium_impact, 3000.00);
    }

    #[tokio::test]
    async fn well_covered_policy_yields_zero_gaps_and_well_formed_result() {
        let orchestrator = orchestrator(Arc::new(FixedGenerator));
        let result = orchestrator.analyze(well_covered_policy()).await.unwrap();

        assert_eq!(result.total_gaps_found, 0);
        assert!(result.coverage_gaps.is_empty());
        assert_eq!(result.total_estimated_premium_impact, 0.00);
        assert!(!result.analysis_summary.is_empty());
        assert_eq!(result.customer_name, "Sam Lee");
    }

    #[tokio::test]
    async fn bare_policy_surfaces_maximal_gaps() {
        let orchestrator = orchestrator(Arc::new(FixedGenerator));
        let mut input = miami_high_net_worth_policy();
        input.existing_coverages.clear();
        input.customer_profile.has_watercraft = true;
        input.customer_profile.has_high_value_items = true;

        let result = orchestrator.analyze(input).await.unwrap();

        // Umbrella, flood, home (coverage-to-value), watercraft, jewelry.
        let types: Vec<CoverageType> = result.coverage_gaps.iter().map(|g| g.gap_type).collect();
        assert!(types.contains(&CoverageType::Umbrella));
        assert!(types.contains(&CoverageType::Flood));
        assert!(types.contains(&CoverageType::Home));
        assert!(types.contains(&CoverageType::Watercraft));
        assert!(types.contains(&CoverageType::Jewelry));
        assert_eq!(result.total_gaps_found, 5);
    }

    #[tokio::test]
    async fn identical_inputs_produce_byte_identical_results() {
        let orchestrator = orchestrator(Arc::new(FixedGenerator));
        let first = orchestrator
            .analyze(miami_high_net_worth_policy())
            .await
            .unwrap();
        let second = orchestrator
            .analyze(miami_high_net_worth_policy())
            .await
            .unwrap();

        let first_json = serde_json::to_string(&first).unwrap();
        let second_json = serde_json::to_string(&second).unwrap();
        assert_eq!(first_json, second_json);
    }

    #[tokio::test]
    async fn total_premium_impact_equals_exact_sum_of_gap_premiums() {
        let orchestrator = orchestrator(Arc::new(FixedGenerator));
        let mut input = miami_high_net_worth_policy();
        input.customer_profile.has_high_value_items = true;
        input.customer_profile.additional_properties = 2;

        let result = orchestrator.analyze(input).await.unwrap();
        let sum: f64 = result
            .coverage_gaps
            .iter()
            .map(|g| g.estimated_annual_premium)
            .sum();
        assert_eq!(
            result.total_estimated_premium_impact,
            models::round_to_cents(sum)
        );
    }

    #[tokio::test]
    async fn unknown_zip_code_still_analyzes() {
        let orchestrator = orchestrator(Arc::new(FixedGenerator));
        let mut input = well_covered_policy();
        input.customer_profile.zip_code = "00000".to_string();

        let result = orchestrator.analyze(input).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn failing_narrative_collaborator_never_fails_the_pipeline() {
        let orchestrator = orchestrator(Arc::new(FailingGenerator));
        let result = orchestrator
            .analyze(miami_high_net_worth_policy())
            .await
            .unwrap();

        assert_eq!(result.total_gaps_found, 2);
        // Fallback templates carry the rationale facts.
        assert!(
            result.coverage_gaps[1]
                .explanation
                .contains("flood")
        );
    }

    #[tokio::test]
    async fn exceeded_request_deadline_fails_without_a_partial_result() {
        let config = AnalysisConfig {
            request_timeout: Some(Duration::from_millis(100)),
            ..AnalysisConfig::default()
        };
        let orchestrator = Orchestrator::new(
            Arc::new(RuleCatalog::builtin()),
            Arc::new(StaticRiskDataSource::builtin()),
            Arc::new(SlowGenerator),
            config,
        );

        let err = orchestrator
            .analyze(miami_high_net_worth_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout(_)));
    }

    #[tokio::test]
    async fn invalid_input_fails_before_any_stage_runs() {
        let orchestrator = orchestrator(Arc::new(FixedGenerator));
        let mut input = miami_high_net_worth_policy();
        input.policy_number = String::new();

        let err = orchestrator.analyze(input).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn zero_gap_result_is_distinguishable_from_failure() {
        let orchestrator = orchestrator(Arc::new(FixedGenerator));
        let result = orchestrator.analyze(well_covered_policy()).await;
        assert!(matches!(result, Ok(r) if r.total_gaps_found == 0));
    }
}
