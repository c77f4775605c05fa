pub mod client;
#[cfg(test)]
pub mod mock;
pub mod search;
pub mod types;

pub use client::SharedKnowledgeSource;
pub use search::{AzureSearchKnowledgeBase, SearchHttp};
pub use types::GroundingContext;
