use tracing::{instrument, warn};

use crate::error::OrchestratorResult;
use crate::llm_client::SharedLlmClient;
use crate::orchestrator::router::{RouteLabel, RoutingDecision};

pub const ROUTER_INSTRUCTIONS: &str = r#"You are a routing agent. Analyze the user query and determine which specialist should handle it.

Respond with ONLY one of these agent names:
- "hr" - for HR policies, PTO, benefits, employee handbook, leave, performance reviews
- "marketing" - for marketing campaigns, brand guidelines, advertising, customer segments, sales
- "products" - for product catalog, specifications, pricing, features, inventory

Just respond with the agent name, nothing else."#;

/// Keyword table checked in order against the lower-cased router output.
const ROUTE_KEYWORDS: &[(RouteLabel, &[&str])] = &[
    (RouteLabel::Hr, &["hr"]),
    (RouteLabel::Marketing, &["marketing", "brand", "campaign"]),
    (RouteLabel::Products, &["product"]),
];

const FALLBACK_LABEL: RouteLabel = RouteLabel::Hr;

/// Map free-form router output to a label. Substring heuristic; anything unmatched lands on `hr`.
pub fn normalize_route(raw: &str) -> RouteLabel {
    match_route(raw).unwrap_or(FALLBACK_LABEL)
}

fn match_route(raw: &str) -> Option<RouteLabel> {
    let normalized = raw.trim().to_lowercase();
    ROUTE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| normalized.contains(kw)))
        .map(|(label, _)| *label)
}

/// Agent with no knowledge base whose only job is to name a specialist.
pub struct RouterAgent {
    llm_client: SharedLlmClient,
}

impl RouterAgent {
    pub fn new(llm_client: SharedLlmClient) -> Self {
        Self { llm_client }
    }

    /// Ask the model for a specialist; the decision carries the label plus the raw output behind it.
    #[instrument(skip_all, name = "router_classify")]
    pub async fn classify(&self, query: &str) -> OrchestratorResult<RoutingDecision> {
        let raw = self.llm_client.complete(ROUTER_INSTRUCTIONS, query).await?;

        let decision = match match_route(&raw) {
            Some(label) => RoutingDecision::classified(label, raw),
            None => {
                warn!(raw_output = %raw.trim(), "Router output matched no label; falling back to hr");
                RoutingDecision::fallback(FALLBACK_LABEL, raw)
            }
        };

        Ok(decision)
    }
}
