use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OrchestratorResult;

use super::types::GroundingContext;

/// A named knowledge base that can ground a query.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    fn name(&self) -> &str;
    async fn retrieve(&self, query: &str) -> OrchestratorResult<GroundingContext>;
}

pub type SharedKnowledgeSource = Arc<dyn KnowledgeSource>;
