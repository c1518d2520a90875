use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::models::{CandidateRecommendation, CoverageSummaryMap, CustomerProfile, RiskProfile};
use crate::rules::RuleCatalog;
use crate::state::{AgentState, StateUpdate};

use super::Stage;

/// Evaluates every catalog rule against the coverage summary, the risk
/// profile, and the customer profile.
///
/// Rules are evaluated in catalog declaration order and fire independently:
/// each sees only the original summaries, never another rule's output.
/// Identical inputs always produce the identical candidate set.
pub struct BestPracticeStage {
    catalog: Arc<RuleCatalog>,
}

impl BestPracticeStage {
    pub fn new(catalog: Arc<RuleCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Stage for BestPracticeStage {
    fn name(&self) -> &'static str {
        "best_practice"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let summary = state.existing_coverages_summary()?;
        let risk = state.risk_profile()?;
        let customer = &state.policy_input.customer_profile;

        let fired = evaluate_rules(&self.catalog, customer, risk, summary);
        let fired_count = fired.len();
        let recommendations = dedup_by_coverage_type(fired);

        debug!(
            rules = self.catalog.len(),
            fired = fired_count,
            candidates = recommendations.len(),
            "rule evaluation complete"
        );

        Ok(StateUpdate::RulesApplied { recommendations })
    }
}

/// A rule fires when its predicate holds and the targeted coverage type is
/// absent from the summary or present with a limit below the rule's computed
/// minimum.
pub fn evaluate_rules(
    catalog: &RuleCatalog,
    customer: &CustomerProfile,
    risk: &RiskProfile,
    summary: &CoverageSummaryMap,
) -> Vec<CandidateRecommendation> {
    let mut fired = Vec::new();
    for (index, rule) in catalog.rules().iter().enumerate() {
        if !(rule.applies)(customer, risk) {
            continue;
        }
        let minimum = (rule.minimum_limit)(customer, risk);
        let under_covered = match summary.get(&rule.coverage_type) {
            None => true,
            Some(existing) => existing.limit < minimum,
        };
        if !under_covered {
            continue;
        }
        fired.push(CandidateRecommendation {
            coverage_type: rule.coverage_type,
            recommended_limit: (rule.recommended_limit)(customer, risk),
            rule_ids: vec![rule.id.to_string()],
            rationale: (rule.rationale)(customer, risk),
            informational: rule.informational,
            catalog_index: index,
        });
    }
    fired
}

/// Merge candidates that target the same coverage type: keep the highest
/// recommended limit, merge rule ids and rationale facts in catalog order,
/// and stay non-informational if any contributor is.
pub fn dedup_by_coverage_type(
    candidates: Vec<CandidateRecommendation>,
) -> Vec<CandidateRecommendation> {
    let mut merged: BTreeMap<_, CandidateRecommendation> = BTreeMap::new();
    for candidate in candidates {
        match merged.entry(candidate.coverage_type) {
            Entry::Vacant(entry) => {
                entry.insert(candidate);
            }
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.recommended_limit =
                    existing.recommended_limit.max(candidate.recommended_limit);
                existing.rule_ids.extend(candidate.rule_ids);
                for fact in candidate.rationale {
                    if !existing.rationale.contains(&fact) {
                        existing.rationale.push(fact);
                    }
                }
                existing.informational = existing.informational && candidate.informational;
                existing.catalog_index = existing.catalog_index.min(candidate.catalog_index);
            }
        }
    }
    let mut deduped: Vec<_> = merged.into_values().collect();
    deduped.sort_by_key(|c| c.catalog_index);
    deduped
}
