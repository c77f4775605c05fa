//! Request/response shapes for the health, chat, and agent-listing operations.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::orchestrator::{Orchestrator, RouteLabel, RoutedResponse};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub agent: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl From<RoutedResponse> for ChatResponse {
    fn from(response: RoutedResponse) -> Self {
        Self {
            message: response.text,
            agent: response.agent.to_string(),
            sources: response.sources,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentList {
    pub agents: Vec<AgentDescriptor>,
}

/// Failure body; `detail` carries the error text unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl From<&OrchestratorError> for ErrorResponse {
    fn from(err: &OrchestratorError) -> Self {
        Self {
            detail: err.to_string(),
        }
    }
}

pub fn agent_catalog() -> AgentList {
    let router = AgentDescriptor {
        id: Orchestrator::ROUTER_ID.to_string(),
        name: "Orchestrator".to_string(),
        description: "Routes requests to specialized agents".to_string(),
    };

    let specialists = RouteLabel::ALL.into_iter().map(|label| AgentDescriptor {
        id: label.agent_id(),
        name: label.display_name().to_string(),
        description: label.description().to_string(),
    });

    AgentList {
        agents: std::iter::once(router).chain(specialists).collect(),
    }
}

#[instrument(skip_all, fields(session_id = request.session_id.as_deref().unwrap_or("")))]
pub async fn chat(
    orchestrator: &Orchestrator,
    request: ChatRequest,
) -> OrchestratorResult<ChatResponse> {
    orchestrator
        .query(&request.message, request.agent.as_deref())
        .await
        .map(ChatResponse::from)
}
