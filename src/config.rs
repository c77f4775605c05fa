use std::env;
use std::time::Duration;

use anyhow::Context;

use crate::orchestrator::RouteLabel;

/// Everything read from the environment at startup. Built once, then passed by reference.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub foundry: FoundryConfig,
    pub search: SearchConfig,
    pub knowledge_bases: KnowledgeBaseNames,
    pub http_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FoundryConfig {
    pub project_endpoint: String,
    pub inference_endpoint: String,
    pub deployment: String,
    pub api_version: String,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseNames {
    pub hr: String,
    pub marketing: String,
    pub products: String,
}

impl KnowledgeBaseNames {
    pub fn for_label(&self, label: RouteLabel) -> &str {
        match label {
            RouteLabel::Hr => &self.hr,
            RouteLabel::Marketing => &self.marketing,
            RouteLabel::Products => &self.products,
        }
    }
}

impl Default for KnowledgeBaseNames {
    fn default() -> Self {
        Self {
            hr: "kb1-hr".to_string(),
            marketing: "kb2-marketing".to_string(),
            products: "kb3-products".to_string(),
        }
    }
}

impl AppConfig {
    const SEARCH_ENDPOINT_VARS: [&'static str; 1] = ["AZURE_SEARCH_ENDPOINT"];
    const PROJECT_ENDPOINT_VARS: [&'static str; 1] = ["AZURE_AI_PROJECT_ENDPOINT"];
    const INFERENCE_ENDPOINT_VARS: [&'static str; 2] =
        ["AZURE_OPENAI_ENDPOINT", "AZURE_AI_INFERENCE_ENDPOINT"];
    const DEPLOYMENT_VARS: [&'static str; 2] = ["AZURE_OPENAI_DEPLOYMENT", "AZURE_AI_MODEL"];
    const OPENAI_API_VERSION_VARS: [&'static str; 1] = ["AZURE_OPENAI_API_VERSION"];
    const SEARCH_API_VERSION_VARS: [&'static str; 1] = ["AZURE_SEARCH_API_VERSION"];
    const KB_HR_VARS: [&'static str; 1] = ["KB_HR_NAME"];
    const KB_MARKETING_VARS: [&'static str; 1] = ["KB_MARKETING_NAME"];
    const KB_PRODUCTS_VARS: [&'static str; 1] = ["KB_PRODUCTS_NAME"];
    const TIMEOUT_VARS: [&'static str; 1] = ["FOUNDRY_HTTP_TIMEOUT_MS"];

    pub const DEFAULT_DEPLOYMENT: &'static str = "gpt-4.1";
    pub const DEFAULT_OPENAI_API_VERSION: &'static str = "2024-10-21";
    pub const DEFAULT_SEARCH_API_VERSION: &'static str = "2025-11-01-preview";
    pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, with the variable source injected so tests never touch the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |candidates: &[&'static str]| {
            candidates
                .iter()
                .filter_map(|key| lookup(*key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let search_endpoint = read(&Self::SEARCH_ENDPOINT_VARS)
            .context("Set AZURE_SEARCH_ENDPOINT to the Azure AI Search service URL")?;
        let project_endpoint = read(&Self::PROJECT_ENDPOINT_VARS)
            .context("Set AZURE_AI_PROJECT_ENDPOINT to the Foundry project URL")?;
        let inference_endpoint = match read(&Self::INFERENCE_ENDPOINT_VARS) {
            Some(endpoint) => endpoint,
            None => endpoint_origin(&project_endpoint).with_context(|| {
                format!("Cannot derive an inference endpoint from '{project_endpoint}'")
            })?,
        };

        let defaults = KnowledgeBaseNames::default();
        let knowledge_bases = KnowledgeBaseNames {
            hr: read(&Self::KB_HR_VARS).unwrap_or(defaults.hr),
            marketing: read(&Self::KB_MARKETING_VARS).unwrap_or(defaults.marketing),
            products: read(&Self::KB_PRODUCTS_VARS).unwrap_or(defaults.products),
        };

        let http_timeout_ms = match read(&Self::TIMEOUT_VARS) {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("FOUNDRY_HTTP_TIMEOUT_MS must be an integer, got '{raw}'"))?,
            None => Self::DEFAULT_TIMEOUT_MS,
        };

        Ok(Self {
            foundry: FoundryConfig {
                project_endpoint,
                inference_endpoint,
                deployment: read(&Self::DEPLOYMENT_VARS)
                    .unwrap_or_else(|| Self::DEFAULT_DEPLOYMENT.to_string()),
                api_version: read(&Self::OPENAI_API_VERSION_VARS)
                    .unwrap_or_else(|| Self::DEFAULT_OPENAI_API_VERSION.to_string()),
            },
            search: SearchConfig {
                endpoint: search_endpoint,
                api_version: read(&Self::SEARCH_API_VERSION_VARS)
                    .unwrap_or_else(|| Self::DEFAULT_SEARCH_API_VERSION.to_string()),
            },
            knowledge_bases,
            http_timeout_ms,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms.max(1))
    }
}

/// `https://host/api/projects/p` -> `https://host`
fn endpoint_origin(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split('/').next().filter(|host| !host.is_empty())?;
    Some(format!("{scheme}://{host}"))
}
