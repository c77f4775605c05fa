use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorResult;

/// Structured payload for a query entering the agent network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub input: String,
}

impl AgentRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Generated answer plus the knowledge-base citations behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub output: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl AgentResponse {
    pub fn new(output: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            output: output.into(),
            sources,
        }
    }
}

#[async_trait]
pub trait AgentBehavior: Send + Sync {
    async fn handle(&self, request: AgentRequest) -> OrchestratorResult<AgentResponse>;
}
