use std::time::Duration;

/// Tunable thresholds and orchestration knobs for one analysis pipeline.
///
/// Constructed once at process start and injected into the orchestrator, so
/// tests can substitute their own values deterministically.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Net worth above which a liability-driven gap is escalated to High
    /// severity (strictly greater than).
    pub high_net_worth_threshold: u64,
    /// Uniform number of attempts per stage. Stages never retry internally.
    pub stage_attempts: u32,
    /// Timeout applied to each external collaborator call (risk lookup,
    /// narrative generation). On expiry the owning stage falls back to its
    /// documented default.
    pub collaborator_timeout: Duration,
    /// Optional deadline for the whole request. On expiry the pipeline
    /// aborts and returns a failure, never a partial result.
    pub request_timeout: Option<Duration>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            high_net_worth_threshold: 1_000_000,
            stage_attempts: 1,
            collaborator_timeout: Duration::from_secs(10),
            request_timeout: None,
        }
    }
}
