use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::models::{
    AnalysisResult, CandidateRecommendation, CoverageGap, CoverageSummaryMap, PolicyInput,
    RiskProfile,
};

/// Phases of the analysis state machine.
///
/// A transition happens only after the stage owning the target phase returns
/// successfully. `Failed` is terminal and reachable from any non-terminal
/// phase; once entered, no further stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Init,
    PolicyAnalyzed,
    RiskAssessed,
    RulesApplied,
    GapsReasoned,
    Complete,
    Failed,
}

/// Output of one stage, applied by the orchestrator to the agent state.
///
/// One variant per stage keeps the per-stage contract typed: a stage cannot
/// write another stage's fields.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    PolicyAnalyzed {
        policy_summary: String,
        existing_coverages_summary: CoverageSummaryMap,
    },
    RiskAssessed {
        risk_profile: RiskProfile,
        risk_factors: Vec<String>,
    },
    RulesApplied {
        recommendations: Vec<CandidateRecommendation>,
    },
    GapsReasoned {
        coverage_gaps: Vec<CoverageGap>,
    },
}

impl StateUpdate {
    /// Phase the pipeline reaches once this update is applied.
    pub fn phase(&self) -> Phase {
        match self {
            StateUpdate::PolicyAnalyzed { .. } => Phase::PolicyAnalyzed,
            StateUpdate::RiskAssessed { .. } => Phase::RiskAssessed,
            StateUpdate::RulesApplied { .. } => Phase::RulesApplied,
            StateUpdate::GapsReasoned { .. } => Phase::GapsReasoned,
        }
    }
}

/// The single accumulator threaded through the pipeline.
///
/// Owned solely by the orchestrator for the lifetime of one request. Fields
/// are write-once: a populated field is read-only to later stages and is
/// never unset.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub policy_input: PolicyInput,
    pub policy_summary: Option<String>,
    pub existing_coverages_summary: Option<CoverageSummaryMap>,
    pub risk_profile: Option<RiskProfile>,
    pub risk_factors: Option<Vec<String>>,
    pub underwriting_recommendations: Option<Vec<CandidateRecommendation>>,
    pub coverage_gaps: Option<Vec<CoverageGap>>,
    pub analysis_result: Option<AnalysisResult>,
}

impl AgentState {
    pub fn new(policy_input: PolicyInput) -> Self {
        Self {
            policy_input,
            policy_summary: None,
            existing_coverages_summary: None,
            risk_profile: None,
            risk_factors: None,
            underwriting_recommendations: None,
            coverage_gaps: None,
            analysis_result: None,
        }
    }

    /// Apply a stage's output, enforcing write-once semantics. Returns the
    /// phase reached on success.
    pub fn apply(&mut self, update: StateUpdate) -> Result<Phase> {
        let phase = update.phase();
        match update {
            StateUpdate::PolicyAnalyzed {
                policy_summary,
                existing_coverages_summary,
            } => {
                if self.policy_summary.is_some() || self.existing_coverages_summary.is_some() {
                    return Err(AnalysisError::StateAlreadySet("policy_summary"));
                }
                self.policy_summary = Some(policy_summary);
                self.existing_coverages_summary = Some(existing_coverages_summary);
            }
            StateUpdate::RiskAssessed {
                risk_profile,
                risk_factors,
            } => {
                if self.risk_profile.is_some() || self.risk_factors.is_some() {
                    return Err(AnalysisError::StateAlreadySet("risk_profile"));
                }
                self.risk_profile = Some(risk_profile);
                self.risk_factors = Some(risk_factors);
            }
            StateUpdate::RulesApplied { recommendations } => {
                if self.underwriting_recommendations.is_some() {
                    return Err(AnalysisError::StateAlreadySet(
                        "underwriting_recommendations",
                    ));
                }
                self.underwriting_recommendations = Some(recommendations);
            }
            StateUpdate::GapsReasoned { coverage_gaps } => {
                if self.coverage_gaps.is_some() {
                    return Err(AnalysisError::StateAlreadySet("coverage_gaps"));
                }
                self.coverage_gaps = Some(coverage_gaps);
            }
        }
        Ok(phase)
    }

    pub fn existing_coverages_summary(&self) -> Result<&CoverageSummaryMap> {
        self.existing_coverages_summary
            .as_ref()
            .ok_or(AnalysisError::MissingState("existing_coverages_summary"))
    }

    pub fn risk_profile(&self) -> Result<&RiskProfile> {
        self.risk_profile
            .as_ref()
            .ok_or(AnalysisError::MissingState("risk_profile"))
    }

    pub fn underwriting_recommendations(&self) -> Result<&[CandidateRecommendation]> {
        self.underwriting_recommendations
            .as_deref()
            .ok_or(AnalysisError::MissingState("underwriting_recommendations"))
    }

    pub fn coverage_gaps(&self) -> Result<&[CoverageGap]> {
        self.coverage_gaps
            .as_deref()
            .ok_or(AnalysisError::MissingState("coverage_gaps"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomerProfile;

    fn state() -> AgentState {
        AgentState::new(PolicyInput {
            policy_number: "POL-1".to_string(),
            customer_profile: CustomerProfile {
                name: "Jane Doe".to_string(),
                zip_code: "33139".to_string(),
                net_worth: 0,
                home_value: 0,
                additional_properties: 0,
                has_watercraft: false,
                has_high_value_items: false,
            },
            existing_coverages: vec![],
        })
    }

    #[test]
    fn apply_sets_field_and_reports_phase() {
        let mut state = state();
        let phase = state
            .apply(StateUpdate::RulesApplied {
                recommendations: vec![],
            })
            .unwrap();
        assert_eq!(phase, Phase::RulesApplied);
        assert!(state.underwriting_recommendations.is_some());
    }

    #[test]
    fn apply_rejects_double_write() {
        let mut state = state();
        state
            .apply(StateUpdate::RulesApplied {
                recommendations: vec![],
            })
            .unwrap();
        let err = state
            .apply(StateUpdate::RulesApplied {
                recommendations: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, AnalysisError::StateAlreadySet(_)));
    }

    #[test]
    fn unpopulated_fields_read_as_missing_state() {
        let state = state();
        assert!(matches!(
            state.risk_profile(),
            Err(AnalysisError::MissingState("risk_profile"))
        ));
    }
}
