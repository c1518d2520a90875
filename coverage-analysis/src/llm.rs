use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::models::{CoverageType, CustomerProfile, Severity};

/// Structured context handed to the narrative collaborator for one gap.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub coverage_type: CoverageType,
    pub title: String,
    pub severity: Severity,
    pub recommended_limit: u64,
    pub rationale: Vec<String>,
    pub customer_name: String,
    pub net_worth: u64,
    pub home_value: u64,
}

impl PromptContext {
    pub fn from_customer(
        customer: &CustomerProfile,
        coverage_type: CoverageType,
        title: &str,
        severity: Severity,
        recommended_limit: u64,
        rationale: &[String],
    ) -> Self {
        Self {
            coverage_type,
            title: title.to_string(),
            severity,
            recommended_limit,
            rationale: rationale.to_vec(),
            customer_name: customer.name.clone(),
            net_worth: customer.net_worth,
            home_value: customer.home_value,
        }
    }

    /// Render the user-facing prompt for the narrative collaborator.
    pub fn render(&self) -> String {
        let facts = self
            .rationale
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Customer: {name}\n\
             Net worth: ${net_worth}\n\
             Home value: ${home_value}\n\n\
             Coverage gap: {title}\n\
             Coverage type: {coverage_type}\n\
             Severity: {severity}\n\
             Recommended limit: ${limit}\n\n\
             Underwriting facts:\n{facts}\n\n\
             In 2-3 sentences, explain in plain English why this coverage gap \
             matters for this customer and how closing it protects their \
             financial wellbeing. Avoid insurance jargon.",
            name = self.customer_name,
            net_worth = self.net_worth,
            home_value = self.home_value,
            title = self.title,
            coverage_type = self.coverage_type,
            severity = self.severity,
            limit = self.recommended_limit,
            facts = facts,
        )
    }
}

/// Narrow seam around the external LLM collaborator.
///
/// The response is opaque narrative text; callers do no structural parsing
/// beyond trimming. Failures and timeouts are recoverable via the gap
/// reasoning stage's deterministic fallback templates.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, context: &PromptContext) -> Result<String, CollaboratorError>;
}

/// Generator that is never available. Routes every gap through the
/// deterministic fallback templates; used when no API key is configured.
pub struct UnavailableNarrativeGenerator;

#[async_trait]
impl NarrativeGenerator for UnavailableNarrativeGenerator {
    async fn generate(&self, _context: &PromptContext) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "no narrative generator configured".to_string(),
        ))
    }
}

#[cfg(feature = "rig")]
pub use rig_generator::RigNarrativeGenerator;

#[cfg(feature = "rig")]
mod rig_generator {
    use async_trait::async_trait;
    use rig::client::CompletionClient;
    use rig::completion::Prompt;
    use rig::providers::openrouter;

    use super::{NarrativeGenerator, PromptContext};
    use crate::error::CollaboratorError;

    const EXPLANATION_PREAMBLE: &str = "You are an insurance advisor expert at explaining \
coverage gaps to customers. Take the technical underwriting facts you are given and write a \
clear, business-friendly explanation of why the gap matters and how the recommended coverage \
protects the customer. Be empathetic and professional, avoid insurance jargon, and answer with \
the explanation text only.";

    /// Narrative generator backed by an OpenRouter-hosted model via rig.
    pub struct RigNarrativeGenerator {
        api_key: String,
        model: String,
    }

    impl RigNarrativeGenerator {
        pub fn from_env() -> anyhow::Result<Self> {
            let api_key = std::env::var("OPENROUTER_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY not set"))?;
            Ok(Self {
                api_key,
                model: "openai/gpt-4o-mini".to_string(),
            })
        }

        pub fn with_model(mut self, model: impl Into<String>) -> Self {
            self.model = model.into();
            self
        }
    }

    #[async_trait]
    impl NarrativeGenerator for RigNarrativeGenerator {
        async fn generate(&self, context: &PromptContext) -> Result<String, CollaboratorError> {
            let client = openrouter::Client::new(&self.api_key);
            let agent = client
                .agent(&self.model)
                .preamble(EXPLANATION_PREAMBLE)
                .build();
            let response = agent
                .prompt(context.render())
                .await
                .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
            Ok(response)
        }
    }
}
