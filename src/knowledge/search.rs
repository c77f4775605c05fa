use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::config::SearchConfig;
use crate::credential::{Credential, CredentialScope};
use crate::error::{OrchestratorError, OrchestratorResult};

use super::client::KnowledgeSource;
use super::types::{GroundingContext, RetrieveRequest, RetrieveResponse};

/// HTTP handle for the Azure AI Search REST surface, shared by every knowledge base.
pub struct SearchHttp {
    http: reqwest::Client,
    config: SearchConfig,
    credential: Credential,
    timeout: Duration,
}

impl SearchHttp {
    pub fn new(
        config: SearchConfig,
        credential: Credential,
        timeout: Duration,
    ) -> OrchestratorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| OrchestratorError::backend("failed to build search HTTP client", err))?;

        Ok(Self {
            http,
            config,
            credential,
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    async fn apply_auth(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> OrchestratorResult<reqwest::RequestBuilder> {
        let auth = self.credential.header(CredentialScope::Search).await?;
        Ok(builder.header(auth.name(), auth.value()?))
    }

    async fn retrieve(
        &self,
        knowledge_base: &str,
        request: &RetrieveRequest,
    ) -> OrchestratorResult<RetrieveResponse> {
        let url = self.endpoint(&format!("knowledgebases/{knowledge_base}/retrieve"));
        let builder = self
            .http
            .post(&url)
            .query(&[("api-version", self.config.api_version.as_str())]);
        let response = self
            .apply_auth(builder)
            .await?
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    OrchestratorError::BackendUnavailable(format!(
                        "knowledge base '{knowledge_base}' timed out after {} ms",
                        self.timeout.as_millis()
                    ))
                } else {
                    OrchestratorError::backend(
                        &format!("knowledge base '{knowledge_base}' request failed"),
                        err,
                    )
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(knowledge_base, status, &body));
        }

        response.json::<RetrieveResponse>().await.map_err(|err| {
            OrchestratorError::backend(
                &format!("failed to decode knowledge base '{knowledge_base}' response"),
                err,
            )
        })
    }
}

fn status_error(knowledge_base: &str, status: StatusCode, body: &str) -> OrchestratorError {
    let reason = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "credential rejected",
        StatusCode::NOT_FOUND => "knowledge base not found",
        StatusCode::TOO_MANY_REQUESTS => "rate limited",
        _ => "request rejected",
    };
    let detail = body.trim();
    if detail.is_empty() {
        OrchestratorError::BackendUnavailable(format!(
            "knowledge base '{knowledge_base}' {reason} (status {status})"
        ))
    } else {
        OrchestratorError::BackendUnavailable(format!(
            "knowledge base '{knowledge_base}' {reason} (status {status}): {detail}"
        ))
    }
}

/// One knowledge base on the search service, queried in answer-synthesis mode.
pub struct AzureSearchKnowledgeBase {
    http: Arc<SearchHttp>,
    name: String,
}

impl AzureSearchKnowledgeBase {
    pub fn new(http: Arc<SearchHttp>, name: impl Into<String>) -> Self {
        Self {
            http,
            name: name.into(),
        }
    }
}

#[async_trait]
impl KnowledgeSource for AzureSearchKnowledgeBase {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip_all, fields(knowledge_base = %self.name))]
    async fn retrieve(&self, query: &str) -> OrchestratorResult<GroundingContext> {
        let request = RetrieveRequest::answer_synthesis(query);
        let grounding = self.http.retrieve(&self.name, &request).await?.into_grounding();
        debug!(
            sources = grounding.sources.len(),
            empty = grounding.is_empty(),
            "Knowledge base retrieval complete"
        );
        Ok(grounding)
    }
}
