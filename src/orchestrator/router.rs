use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::agents::{instructions_for, SpecialistAgent};
use crate::config::AppConfig;
use crate::credential::{CredentialProvider, CredentialScope};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::knowledge::{AzureSearchKnowledgeBase, SearchHttp, SharedKnowledgeSource};
use crate::llm_client::{AzureOpenAiLlmClient, SharedLlmClient};
use crate::orchestrator::routing::RouterAgent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteLabel {
    Hr,
    Marketing,
    Products,
}

impl RouteLabel {
    pub const ALL: [RouteLabel; 3] = [RouteLabel::Hr, RouteLabel::Marketing, RouteLabel::Products];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLabel::Hr => "hr",
            RouteLabel::Marketing => "marketing",
            RouteLabel::Products => "products",
        }
    }

    /// Identifier used in the agent listing, e.g. `hr_agent`.
    pub fn agent_id(&self) -> String {
        format!("{}_agent", self.as_str())
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RouteLabel::Hr => "HR Agent",
            RouteLabel::Marketing => "Marketing Agent",
            RouteLabel::Products => "Products Agent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RouteLabel::Hr => "Handles HR policies, PTO, benefits, and employee handbook queries",
            RouteLabel::Marketing => "Handles marketing campaigns, brand guidelines, and strategy queries",
            RouteLabel::Products => "Handles product catalog, specifications, and pricing queries",
        }
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RouteLabel {
    type Err = OrchestratorError;

    /// Accepts `hr` or `hr_agent`, any case.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_lowercase();
        let bare = normalized.strip_suffix("_agent").unwrap_or(&normalized);
        RouteLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == bare)
            .ok_or_else(|| OrchestratorError::UnknownAgent(raw.trim().to_string()))
    }
}

/// How a label was chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub label: RouteLabel,
    pub raw_output: String,
    pub fallback: bool,
    pub explicit: bool,
}

impl RoutingDecision {
    pub(crate) fn classified(label: RouteLabel, raw_output: String) -> Self {
        Self {
            label,
            raw_output,
            fallback: false,
            explicit: false,
        }
    }

    pub(crate) fn fallback(label: RouteLabel, raw_output: String) -> Self {
        Self {
            label,
            raw_output,
            fallback: true,
            explicit: false,
        }
    }

    fn explicit(label: RouteLabel) -> Self {
        Self {
            label,
            raw_output: String::new(),
            fallback: false,
            explicit: true,
        }
    }
}

/// Full answer for one query: text, producing agent, citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedResponse {
    pub text: String,
    pub agent: RouteLabel,
    pub sources: Vec<String>,
    pub decision: RoutingDecision,
}

/// Owns the router and every specialist, plus the shared client handles they hold.
pub struct Orchestrator {
    router: RouterAgent,
    specialists: HashMap<RouteLabel, SpecialistAgent>,
}

impl Orchestrator {
    /// Reserved id for "let the router decide" in explicit-agent requests and the agent listing.
    pub const ROUTER_ID: &'static str = "orchestrator";

    /// Acquire credentials, build the shared generation and search clients, register every specialist.
    pub fn start(
        config: &AppConfig,
        credentials: &dyn CredentialProvider,
    ) -> OrchestratorResult<Self> {
        let generation = credentials.credential(CredentialScope::Generation)?;
        let search = credentials.credential(CredentialScope::Search)?;

        let llm_client =
            AzureOpenAiLlmClient::shared(&config.foundry, generation, config.http_timeout())?;
        let search_http = Arc::new(SearchHttp::new(
            config.search.clone(),
            search,
            config.http_timeout(),
        )?);

        let mut orchestrator = Self::new(RouterAgent::new(llm_client.clone()));
        for label in RouteLabel::ALL {
            let knowledge: SharedKnowledgeSource = Arc::new(AzureSearchKnowledgeBase::new(
                search_http.clone(),
                config.knowledge_bases.for_label(label),
            ));
            orchestrator = orchestrator.with_specialist(SpecialistAgent::new(
                label,
                instructions_for(label),
                knowledge,
                llm_client.clone(),
            ));
        }

        info!(
            project = %config.foundry.project_endpoint,
            deployment = %config.foundry.deployment,
            search = %config.search.endpoint,
            "Orchestrator started"
        );
        Ok(orchestrator)
    }

    pub fn new(router: RouterAgent) -> Self {
        Self {
            router,
            specialists: HashMap::new(),
        }
    }

    pub fn with_specialist(mut self, specialist: SpecialistAgent) -> Self {
        self.specialists.insert(specialist.label(), specialist);
        self
    }

    /// Build from explicit parts; used when the clients come from somewhere other than `start`.
    pub fn from_parts(
        llm_client: SharedLlmClient,
        knowledge: impl IntoIterator<Item = (RouteLabel, SharedKnowledgeSource)>,
    ) -> Self {
        knowledge.into_iter().fold(
            Self::new(RouterAgent::new(llm_client.clone())),
            |orchestrator, (label, source)| {
                orchestrator.with_specialist(SpecialistAgent::new(
                    label,
                    instructions_for(label),
                    source,
                    llm_client.clone(),
                ))
            },
        )
    }

    /// Release every client and credential handle.
    pub fn stop(self) {
        let specialists = self.specialists.len();
        drop(self);
        info!(specialists, "Orchestrator stopped; client handles released");
    }

    pub fn knowledge_base(&self, label: RouteLabel) -> Option<&str> {
        self.specialists.get(&label).map(|s| s.knowledge_base())
    }

    /// Route `text` (or honour `explicit_agent`) and return the specialist's grounded answer.
    #[instrument(skip_all, fields(explicit_agent = explicit_agent.unwrap_or("")))]
    pub async fn query(
        &self,
        text: &str,
        explicit_agent: Option<&str>,
    ) -> OrchestratorResult<RoutedResponse> {
        let query = text.trim();
        if query.is_empty() {
            return Err(OrchestratorError::EmptyQuery);
        }

        let decision = match Self::explicit_label(explicit_agent)? {
            Some(label) => RoutingDecision::explicit(label),
            None => self.router.classify(query).await?,
        };

        let specialist = self
            .specialists
            .get(&decision.label)
            .ok_or_else(|| OrchestratorError::UnknownAgent(decision.label.to_string()))?;

        info!(
            agent = %decision.label,
            explicit = decision.explicit,
            fallback = decision.fallback,
            "Routing to specialist"
        );

        let (answer, sources) = specialist.answer(query).await?;

        Ok(RoutedResponse {
            text: answer,
            agent: decision.label,
            sources,
            decision,
        })
    }

    fn explicit_label(explicit_agent: Option<&str>) -> OrchestratorResult<Option<RouteLabel>> {
        match explicit_agent.map(str::trim) {
            None | Some("") => Ok(None),
            Some(id) if id.eq_ignore_ascii_case(Self::ROUTER_ID) => Ok(None),
            Some(id) => id.parse::<RouteLabel>().map(Some),
        }
    }
}
