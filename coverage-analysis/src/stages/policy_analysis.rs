use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::models::{CoverageSummary, CoverageSummaryMap, round_to_cents};
use crate::state::{AgentState, StateUpdate};

use super::Stage;

/// Summarizes the existing coverages on the input policy.
///
/// Produces the per-coverage-type summary map (last occurrence wins when a
/// type repeats; duplicates are not an error) and a short textual summary.
/// An empty coverage list yields an empty map, not a failure.
pub struct PolicyAnalysisStage;

#[async_trait]
impl Stage for PolicyAnalysisStage {
    fn name(&self) -> &'static str {
        "policy_analysis"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let input = &state.policy_input;

        let mut summary_map = CoverageSummaryMap::new();
        for coverage in &input.existing_coverages {
            summary_map.insert(
                coverage.coverage_type,
                CoverageSummary {
                    limit: coverage.limit,
                    deductible: coverage.deductible,
                    premium: coverage.premium,
                },
            );
        }

        let policy_summary = summarize(&input.policy_number, &summary_map);
        debug!(
            policy_number = %input.policy_number,
            coverage_types = summary_map.len(),
            "policy analysis complete"
        );

        Ok(StateUpdate::PolicyAnalyzed {
            policy_summary,
            existing_coverages_summary: summary_map,
        })
    }
}

fn summarize(policy_number: &str, summary_map: &CoverageSummaryMap) -> String {
    if summary_map.is_empty() {
        return format!("Policy {policy_number} has no existing coverages on file.");
    }
    let types = summary_map
        .keys()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let total_limit: u64 = summary_map.values().map(|c| c.limit).sum();
    let total_premium = round_to_cents(summary_map.values().map(|c| c.premium).sum());
    format!(
        "Policy {policy_number} carries {count} coverage type(s) ({types}), \
         with combined limits of ${total_limit} and total annual premium of ${total_premium:.2}.",
        count = summary_map.len(),
    )
}
