pub mod best_practice;
pub mod gap_reasoning;
pub mod policy_analysis;
pub mod risk_context;

pub use best_practice::BestPracticeStage;
pub use gap_reasoning::GapReasoningStage;
pub use policy_analysis::PolicyAnalysisStage;
pub use risk_context::RiskContextStage;

use async_trait::async_trait;

use crate::error::Result;
use crate::state::{AgentState, StateUpdate};

/// One stage of the analysis pipeline.
///
/// A stage is a pure function over the immutable prior state: it reads only
/// the fields it needs and returns its own output as a [`StateUpdate`],
/// which the orchestrator applies. Stages never retry internally.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: &AgentState) -> Result<StateUpdate>;
}
