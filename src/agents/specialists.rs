use async_trait::async_trait;
use tracing::{info, instrument};

use crate::error::OrchestratorResult;
use crate::knowledge::{GroundingContext, SharedKnowledgeSource};
use crate::llm_client::SharedLlmClient;
use crate::orchestrator::RouteLabel;

use super::traits::{AgentBehavior, AgentRequest, AgentResponse};

pub const HR_INSTRUCTIONS: &str = "You are an HR Specialist Agent for Zava Corporation.
Answer questions about HR policies, PTO, benefits, and employee handbook using the knowledge base.
Be specific and cite sources when possible.";

pub const MARKETING_INSTRUCTIONS: &str = "You are a Marketing Specialist Agent for Zava Corporation.
Answer questions about marketing campaigns, brand guidelines, and marketing strategies using the knowledge base.
Be specific and cite sources when possible.";

pub const PRODUCTS_INSTRUCTIONS: &str = "You are a Products Specialist Agent for Zava Corporation.
Answer questions about products, catalog, specifications, and pricing using the knowledge base.
Be specific and cite sources when possible.";

pub fn instructions_for(label: RouteLabel) -> &'static str {
    match label {
        RouteLabel::Hr => HR_INSTRUCTIONS,
        RouteLabel::Marketing => MARKETING_INSTRUCTIONS,
        RouteLabel::Products => PRODUCTS_INSTRUCTIONS,
    }
}

fn format_prompt(request: &AgentRequest, context: &GroundingContext) -> String {
    let mut prompt = String::new();

    if !context.is_empty() {
        prompt.push_str("Knowledge base context:\n");
        prompt.push_str(context.text.trim());
        if !context.sources.is_empty() {
            prompt.push_str("\n\nSources: ");
            prompt.push_str(&context.sources.join(", "));
        }
        prompt.push_str("\n\n");
    }

    prompt.push_str("Question:\n");
    prompt.push_str(request.input.trim());

    prompt
}

/// Specialist bound to one knowledge base and one role persona.
pub struct SpecialistAgent {
    label: RouteLabel,
    instructions: String,
    knowledge: SharedKnowledgeSource,
    llm_client: SharedLlmClient,
}

impl SpecialistAgent {
    pub fn new(
        label: RouteLabel,
        instructions: impl Into<String>,
        knowledge: SharedKnowledgeSource,
        llm_client: SharedLlmClient,
    ) -> Self {
        Self {
            label,
            instructions: instructions.into(),
            knowledge,
            llm_client,
        }
    }

    pub fn label(&self) -> RouteLabel {
        self.label
    }

    pub fn knowledge_base(&self) -> &str {
        self.knowledge.name()
    }

    pub async fn answer(&self, query: &str) -> OrchestratorResult<(String, Vec<String>)> {
        let response = self.handle(AgentRequest::new(query)).await?;
        Ok((response.output, response.sources))
    }
}

#[async_trait]
impl AgentBehavior for SpecialistAgent {
    #[instrument(skip_all, fields(role = %self.label, knowledge_base = %self.knowledge.name()))]
    async fn handle(&self, request: AgentRequest) -> OrchestratorResult<AgentResponse> {
        let context = self.knowledge.retrieve(request.input.trim()).await?;
        if context.is_empty() {
            info!("Knowledge base returned no context; answering from instructions only");
        }

        let prompt = format_prompt(&request, &context);
        let output = self.llm_client.complete(&self.instructions, &prompt).await?;
        Ok(AgentResponse::new(output, context.sources))
    }
}
