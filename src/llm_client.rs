use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_openai::config::Config;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client as AsyncOpenAiClient;
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::header::HeaderMap;
use secrecy::Secret;
use tracing::instrument;

use crate::config::FoundryConfig;
use crate::credential::{AuthHeader, Credential, CredentialScope};
use crate::error::{OrchestratorError, OrchestratorResult};

pub type SharedLlmClient = Arc<dyn LlmClient>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One chat turn: `instructions` as the system message, `message` as the user message.
    async fn complete(&self, instructions: &str, message: &str) -> OrchestratorResult<String>;
}

/// Azure OpenAI deployment routing with whichever auth header the credential resolved to.
#[derive(Clone)]
struct DeploymentConfig {
    api_base: String,
    api_version: String,
    deployment: String,
    headers: HeaderMap,
    secret: Secret<String>,
}

impl Config for DeploymentConfig {
    fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/openai/deployments/{}{}",
            self.api_base, self.deployment, path
        )
    }

    fn query(&self) -> Vec<(&str, &str)> {
        vec![("api-version", self.api_version.as_str())]
    }

    fn api_base(&self) -> &str {
        &self.api_base
    }

    fn api_key(&self) -> &Secret<String> {
        &self.secret
    }
}

/// async-openai retries 429s on its own; this gives up after the first attempt.
fn single_attempt() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

/// Chat completions against an Azure OpenAI / Foundry model deployment.
pub struct AzureOpenAiLlmClient {
    http: reqwest::Client,
    api_base: String,
    api_version: String,
    deployment: String,
    credential: Credential,
    timeout: Duration,
    /// Client built for the last auth secret seen; rebuilt when a token is refreshed.
    cached: Mutex<Option<(String, AsyncOpenAiClient<DeploymentConfig>)>>,
}

impl AzureOpenAiLlmClient {
    const TEMPERATURE: f32 = 0.2;

    pub fn new(
        config: &FoundryConfig,
        credential: Credential,
        timeout: Duration,
    ) -> OrchestratorResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| OrchestratorError::backend("failed to build generation HTTP client", err))?;

        Ok(Self {
            http,
            api_base: config.inference_endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            deployment: config.deployment.clone(),
            credential,
            timeout,
            cached: Mutex::new(None),
        })
    }

    pub fn shared(
        config: &FoundryConfig,
        credential: Credential,
        timeout: Duration,
    ) -> OrchestratorResult<SharedLlmClient> {
        Ok(Arc::new(Self::new(config, credential, timeout)?))
    }

    fn client_for(&self, auth: &AuthHeader) -> OrchestratorResult<AsyncOpenAiClient<DeploymentConfig>> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((secret, client)) = cached.as_ref() {
            if secret == auth.secret() {
                return Ok(client.clone());
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(auth.name(), auth.value()?);
        let config = DeploymentConfig {
            api_base: self.api_base.clone(),
            api_version: self.api_version.clone(),
            deployment: self.deployment.clone(),
            headers,
            secret: Secret::new(auth.secret().to_string()),
        };
        let client = AsyncOpenAiClient::with_config(config)
            .with_http_client(self.http.clone())
            .with_backoff(single_attempt());

        *cached = Some((auth.secret().to_string(), client.clone()));
        Ok(client)
    }

    #[instrument(level = "debug", skip_all, fields(deployment = %self.deployment))]
    async fn chat(&self, instructions: &str, message: &str) -> OrchestratorResult<String> {
        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(instructions)
            .build()
            .map_err(|err| OrchestratorError::backend("invalid system message", err))?;
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(message)
            .build()
            .map_err(|err| OrchestratorError::backend("invalid user message", err))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.deployment)
            .temperature(Self::TEMPERATURE)
            .messages(vec![system_message.into(), user_message.into()])
            .build()
            .map_err(|err| OrchestratorError::backend("invalid chat request", err))?;

        let auth = self.credential.header(CredentialScope::Generation).await?;
        let client = self.client_for(&auth)?;

        let response = tokio::time::timeout(self.timeout, client.chat().create(request))
            .await
            .map_err(|_| {
                OrchestratorError::BackendUnavailable(format!(
                    "chat completion timed out after {} ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|err| OrchestratorError::backend("chat completion failed", err))?;

        let choice = response.choices.first().ok_or_else(|| {
            OrchestratorError::BackendUnavailable(
                "LLM response did not contain any choices".to_string(),
            )
        })?;

        Ok(choice.message.content.clone().unwrap_or_default())
    }
}

#[async_trait]
impl LlmClient for AzureOpenAiLlmClient {
    async fn complete(&self, instructions: &str, message: &str) -> OrchestratorResult<String> {
        self.chat(instructions, message).await
    }
}
