use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{OrchestratorError, OrchestratorResult};

use super::client::KnowledgeSource;
use super::types::GroundingContext;

/// In-memory knowledge base: returns a fixed context, or fails on demand.
pub struct MockKnowledgeBase {
    name: String,
    context: Option<GroundingContext>,
    retrievals: AtomicUsize,
}

impl MockKnowledgeBase {
    pub fn new(name: &str, text: &str, sources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            context: Some(GroundingContext {
                text: text.to_string(),
                sources: sources.iter().map(|s| s.to_string()).collect(),
            }),
            retrievals: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            context: None,
            retrievals: AtomicUsize::new(0),
        }
    }

    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl KnowledgeSource for MockKnowledgeBase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, _query: &str) -> OrchestratorResult<GroundingContext> {
        self.retrievals.fetch_add(1, Ordering::Relaxed);
        self.context.clone().ok_or_else(|| {
            OrchestratorError::BackendUnavailable(format!(
                "knowledge base '{}' request failed: connection refused",
                self.name
            ))
        })
    }
}
