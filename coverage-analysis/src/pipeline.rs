use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::llm::NarrativeGenerator;
use crate::models::{AnalysisResult, PolicyInput, Severity, round_to_cents};
use crate::risk::RiskDataSource;
use crate::rules::RuleCatalog;
use crate::stages::{
    BestPracticeStage, GapReasoningStage, PolicyAnalysisStage, RiskContextStage, Stage,
};
use crate::state::{AgentState, Phase, StateUpdate};

/// Sequences the four analysis stages over a single [`AgentState`].
///
/// The pipeline is a fixed linear state machine: Init → PolicyAnalyzed →
/// RiskAssessed → RulesApplied → GapsReasoned → Complete, with Failed as the
/// terminal error state. Each request gets its own state; the orchestrator,
/// catalog and risk source are shared read-only and safe for concurrent use.
pub struct Orchestrator {
    policy_analysis: PolicyAnalysisStage,
    risk_context: RiskContextStage,
    best_practice: BestPracticeStage,
    gap_reasoning: GapReasoningStage,
    config: AnalysisConfig,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<RuleCatalog>,
        risk_source: Arc<dyn RiskDataSource>,
        generator: Arc<dyn NarrativeGenerator>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            policy_analysis: PolicyAnalysisStage,
            risk_context: RiskContextStage::new(risk_source, config.collaborator_timeout),
            best_practice: BestPracticeStage::new(catalog),
            gap_reasoning: GapReasoningStage::new(
                generator,
                config.collaborator_timeout,
                config.high_net_worth_threshold,
            ),
            config,
        }
    }

    /// Run the complete coverage gap analysis for one policy.
    ///
    /// A zero-gap result is a valid success; errors are returned only for
    /// invalid input, stage failures, or an exceeded request deadline.
    pub async fn analyze(&self, input: PolicyInput) -> Result<AnalysisResult> {
        input.validate()?;
        info!(policy_number = %input.policy_number, "starting coverage gap analysis");

        let state = AgentState::new(input);
        let result = match self.config.request_timeout {
            Some(deadline) => tokio::time::timeout(deadline, self.run_pipeline(state))
                .await
                .map_err(|_| AnalysisError::Timeout(deadline))??,
            None => self.run_pipeline(state).await?,
        };

        info!(
            policy_number = %result.policy_number,
            gaps = result.total_gaps_found,
            premium_impact = result.total_estimated_premium_impact,
            "coverage gap analysis complete"
        );
        Ok(result)
    }

    async fn run_pipeline(&self, mut state: AgentState) -> Result<AnalysisResult> {
        let stages: [&dyn Stage; 4] = [
            &self.policy_analysis,
            &self.risk_context,
            &self.best_practice,
            &self.gap_reasoning,
        ];

        for stage in stages {
            let update = match self.run_stage(stage, &state).await {
                Ok(update) => update,
                Err(e) => {
                    error!(stage = stage.name(), phase = ?Phase::Failed, error = %e,
                        "pipeline failed");
                    return Err(e);
                }
            };
            let phase = state.apply(update).map_err(|e| AnalysisError::StageFailed {
                stage: stage.name(),
                message: e.to_string(),
            })?;
            info!(stage = stage.name(), phase = ?phase, "stage complete");
        }

        let result = finalize(&mut state)?;
        info!(phase = ?Phase::Complete, "pipeline complete");
        Ok(result)
    }

    /// Execute one stage with the uniform bounded attempt count. Retry policy
    /// lives here; stages themselves never retry.
    async fn run_stage(
        &self,
        stage: &dyn Stage,
        state: &AgentState,
    ) -> Result<StateUpdate> {
        let attempts = self.config.stage_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            let started = Instant::now();
            match stage.run(state).await {
                Ok(update) => {
                    info!(
                        stage = stage.name(),
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "stage succeeded"
                    );
                    return Ok(update);
                }
                Err(e) => {
                    warn!(stage = stage.name(), attempt, error = %e, "stage attempt failed");
                    last_error = Some(e);
                }
            }
        }
        let source = last_error.expect("at least one attempt was made");
        Err(AnalysisError::StageFailed {
            stage: stage.name(),
            message: source.to_string(),
        })
    }
}

/// Build the terminal result from the completed state: exact premium sum and
/// the aggregate summary text.
fn finalize(state: &mut AgentState) -> Result<AnalysisResult> {
    let gaps = state.coverage_gaps()?.to_vec();
    let input = &state.policy_input;

    let total_premium_impact = round_to_cents(
        gaps.iter()
            .map(|gap| gap.estimated_annual_premium)
            .sum::<f64>(),
    );

    let analysis_summary = if gaps.is_empty() {
        "No significant coverage gaps identified. Current policy provides adequate protection."
            .to_string()
    } else {
        let high_severity = gaps
            .iter()
            .filter(|gap| gap.severity == Severity::High)
            .count();
        format!(
            "Analysis identified {} coverage gap(s), including {} high-priority item(s). \
             Total estimated premium impact: ${:.2}/year. Addressing these gaps will \
             significantly improve financial protection.",
            gaps.len(),
            high_severity,
            total_premium_impact
        )
    };

    let result = AnalysisResult {
        policy_number: input.policy_number.clone(),
        customer_name: input.customer_profile.name.clone(),
        total_gaps_found: gaps.len(),
        coverage_gaps: gaps,
        total_estimated_premium_impact: total_premium_impact,
        analysis_summary,
    };
    state.analysis_result = Some(result.clone());
    Ok(result)
}
