use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Which backend a credential is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialScope {
    Generation,
    Search,
}

impl CredentialScope {
    /// Entra ID scope requested when the backend is reached with a bearer token.
    pub fn token_scope(&self) -> &'static str {
        match self {
            CredentialScope::Generation => "https://cognitiveservices.azure.com/.default",
            CredentialScope::Search => "https://search.azure.com/.default",
        }
    }
}

impl fmt::Display for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialScope::Generation => write!(f, "generation"),
            CredentialScope::Search => write!(f, "search"),
        }
    }
}

/// API key that never shows up in logs or `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Bearer token plus the instant it stops being accepted.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Tokens this close to expiry are refreshed instead of reused.
    const REFRESH_MARGIN_SECS: i64 = 300;

    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn expose(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(Self::REFRESH_MARGIN_SECS) < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of short-lived bearer tokens. Implementations refresh on their own schedule.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn token(&self, scope: CredentialScope) -> OrchestratorResult<AccessToken>;
}

pub type SharedTokenCredential = Arc<dyn TokenCredential>;

/// How one backend is authenticated for the lifetime of the orchestrator.
#[derive(Clone)]
pub enum Credential {
    ApiKey(ApiKey),
    Token(SharedTokenCredential),
}

impl Credential {
    /// Resolve the header for the next request, refreshing the token if needed.
    pub async fn header(&self, scope: CredentialScope) -> OrchestratorResult<AuthHeader> {
        match self {
            Credential::ApiKey(key) => Ok(AuthHeader::ApiKey(key.clone())),
            Credential::Token(source) => Ok(AuthHeader::Bearer(source.token(scope).await?)),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(key) => f.debug_tuple("ApiKey").field(key).finish(),
            Credential::Token(_) => f.write_str("Token(..)"),
        }
    }
}

/// Authentication header for a single request.
#[derive(Debug, Clone)]
pub enum AuthHeader {
    ApiKey(ApiKey),
    Bearer(AccessToken),
}

impl AuthHeader {
    pub fn name(&self) -> HeaderName {
        match self {
            AuthHeader::ApiKey(_) => HeaderName::from_static("api-key"),
            AuthHeader::Bearer(_) => AUTHORIZATION,
        }
    }

    pub fn value(&self) -> OrchestratorResult<HeaderValue> {
        let raw = match self {
            AuthHeader::ApiKey(key) => key.expose().to_string(),
            AuthHeader::Bearer(token) => format!("Bearer {}", token.expose()),
        };
        let mut value = HeaderValue::from_str(&raw).map_err(|_| {
            OrchestratorError::AuthenticationFailure(
                "credential contains characters that cannot be sent in an HTTP header".to_string(),
            )
        })?;
        value.set_sensitive(true);
        Ok(value)
    }

    pub fn secret(&self) -> &str {
        match self {
            AuthHeader::ApiKey(key) => key.expose(),
            AuthHeader::Bearer(token) => token.expose(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Entra ID client-credentials flow (tenant, client id, client secret), cached per scope.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: ApiKey,
    cache: Mutex<HashMap<CredentialScope, AccessToken>>,
}

impl ClientSecretCredential {
    pub const DEFAULT_AUTHORITY: &'static str = "https://login.microsoftonline.com";

    pub fn new(
        authority: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: ApiKey,
        timeout: Duration,
    ) -> OrchestratorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                OrchestratorError::AuthenticationFailure(format!(
                    "failed to build token HTTP client: {err}"
                ))
            })?;

        Ok(Self {
            http,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority.trim_end_matches('/'),
                tenant_id.trim_matches('/')
            ),
            client_id: client_id.into(),
            client_secret,
            cache: Mutex::new(HashMap::new()),
        })
    }

    async fn request_token(&self, scope: CredentialScope) -> OrchestratorResult<AccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
            ("scope", scope.token_scope()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|err| {
                OrchestratorError::AuthenticationFailure(format!(
                    "{scope} token request failed: {err}"
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenErrorResponse>(&body).unwrap_or_default();
            let reason = [detail.error_description.trim(), detail.error.trim(), body.trim()]
                .into_iter()
                .find(|text| !text.is_empty())
                .unwrap_or("no detail");
            return Err(OrchestratorError::AuthenticationFailure(format!(
                "{scope} token request rejected (status {status}): {reason}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|err| {
            OrchestratorError::AuthenticationFailure(format!(
                "{scope} token response could not be decoded: {err}"
            ))
        })?;

        Ok(AccessToken::new(
            token.access_token,
            Utc::now() + chrono::Duration::seconds(token.expires_in),
        ))
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    #[instrument(level = "debug", skip(self))]
    async fn token(&self, scope: CredentialScope) -> OrchestratorResult<AccessToken> {
        // Held across the refresh so concurrent callers wait for one token request.
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(&scope).filter(|token| token.is_fresh(Utc::now())) {
            return Ok(token.clone());
        }

        let token = self.request_token(scope).await?;
        debug!(%scope, expires_at = %token.expires_at(), "Access token refreshed");
        cache.insert(scope, token.clone());
        Ok(token)
    }
}

pub trait CredentialProvider: Send + Sync {
    fn credential(&self, scope: CredentialScope) -> OrchestratorResult<Credential>;
}

/// Reads credentials from the process environment (and therefore from `.env` via dotenvy).
///
/// An API key for the scope wins; otherwise the Entra ID service principal variables are used.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    timeout: Duration,
}

impl EnvCredentialProvider {
    const GENERATION_KEY_VARS: [&'static str; 2] = ["AZURE_OPENAI_API_KEY", "AZURE_AI_API_KEY"];
    const SEARCH_KEY_VARS: [&'static str; 1] = ["AZURE_SEARCH_API_KEY"];
    const TENANT_VARS: [&'static str; 1] = ["AZURE_TENANT_ID"];
    const CLIENT_ID_VARS: [&'static str; 1] = ["AZURE_CLIENT_ID"];
    const CLIENT_SECRET_VARS: [&'static str; 1] = ["AZURE_CLIENT_SECRET"];
    const AUTHORITY_VARS: [&'static str; 1] = ["AZURE_AUTHORITY_HOST"];

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn key_candidates(scope: CredentialScope) -> &'static [&'static str] {
        match scope {
            CredentialScope::Generation => &Self::GENERATION_KEY_VARS,
            CredentialScope::Search => &Self::SEARCH_KEY_VARS,
        }
    }

    /// Same as `credential`, with the variable source injected so tests never touch the process env.
    pub fn resolve<F>(&self, scope: CredentialScope, lookup: F) -> OrchestratorResult<Credential>
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

        let key_vars = Self::key_candidates(scope);
        if let Some(key) = read(key_vars) {
            return Ok(Credential::ApiKey(ApiKey::new(key)));
        }

        match (
            read(&Self::TENANT_VARS),
            read(&Self::CLIENT_ID_VARS),
            read(&Self::CLIENT_SECRET_VARS),
        ) {
            (Some(tenant), Some(client_id), Some(secret)) => {
                let authority = read(&Self::AUTHORITY_VARS)
                    .unwrap_or_else(|| ClientSecretCredential::DEFAULT_AUTHORITY.to_string());
                let credential = ClientSecretCredential::new(
                    &authority,
                    &tenant,
                    client_id,
                    ApiKey::new(secret),
                    self.timeout,
                )?;
                Ok(Credential::Token(Arc::new(credential)))
            }
            _ => Err(OrchestratorError::AuthenticationFailure(format!(
                "no {scope} credential found; set {} or AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET",
                key_vars.join(" or ")
            ))),
        }
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn credential(&self, scope: CredentialScope) -> OrchestratorResult<Credential> {
        self.resolve(scope, |key| env::var(key).ok())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_http::StubServer;

    fn lookup_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    fn client_secret(authority: &str) -> ClientSecretCredential {
        ClientSecretCredential::new(
            authority,
            "tenant-1",
            "client-1",
            ApiKey::new("s3cret"),
            Duration::from_secs(2),
        )
        .expect("credential")
    }

    #[test]
    fn debug_output_hides_secrets() {
        let key = ApiKey::new("super-secret");
        assert_eq!(format!("{key:?}"), "ApiKey(<redacted>)");
        assert_eq!(key.expose(), "super-secret");

        let token = AccessToken::new("eyJ0eXAi", Utc::now());
        assert!(!format!("{token:?}").contains("eyJ0eXAi"));
    }

    #[test]
    fn api_key_wins_over_service_principal() {
        let provider = EnvCredentialProvider::new(Duration::from_secs(1));
        let credential = provider
            .resolve(
                CredentialScope::Search,
                lookup_from(&[
                    ("AZURE_SEARCH_API_KEY", "search-key"),
                    ("AZURE_TENANT_ID", "t"),
                    ("AZURE_CLIENT_ID", "c"),
                    ("AZURE_CLIENT_SECRET", "s"),
                ]),
            )
            .expect("credential");
        assert!(matches!(credential, Credential::ApiKey(key) if key.expose() == "search-key"));
    }

    #[test]
    fn service_principal_yields_token_credential() {
        let provider = EnvCredentialProvider::new(Duration::from_secs(1));
        let credential = provider
            .resolve(
                CredentialScope::Generation,
                lookup_from(&[
                    ("AZURE_TENANT_ID", "t"),
                    ("AZURE_CLIENT_ID", "c"),
                    ("AZURE_CLIENT_SECRET", "s"),
                ]),
            )
            .expect("credential");
        assert!(matches!(credential, Credential::Token(_)));
    }

    #[test]
    fn incomplete_environment_is_authentication_failure() {
        let provider = EnvCredentialProvider::new(Duration::from_secs(1));
        let err = provider
            .resolve(
                CredentialScope::Generation,
                lookup_from(&[("AZURE_TENANT_ID", "t"), ("AZURE_CLIENT_ID", "c")]),
            )
            .expect_err("secret missing");
        assert!(matches!(err, OrchestratorError::AuthenticationFailure(_)));
        assert!(err.to_string().contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn static_provider_reports_missing_scope() {
        let provider = testing::StaticCredentialProvider::keys(Some("gen"), None);
        assert!(provider.credential(CredentialScope::Generation).is_ok());

        let err = provider
            .credential(CredentialScope::Search)
            .expect_err("search key missing");
        assert!(matches!(err, OrchestratorError::AuthenticationFailure(_)));
        assert!(err.to_string().contains("search"));
    }

    #[test]
    fn header_shapes() {
        let key = AuthHeader::ApiKey(ApiKey::new("k"));
        assert_eq!(key.name().as_str(), "api-key");
        assert_eq!(key.value().expect("value"), "k");

        let bearer = AuthHeader::Bearer(AccessToken::new("t0k", Utc::now()));
        assert_eq!(bearer.name(), AUTHORIZATION);
        assert_eq!(bearer.value().expect("value"), "Bearer t0k");
        assert!(bearer.value().expect("value").is_sensitive());

        let broken = AuthHeader::ApiKey(ApiKey::new("line\nbreak"));
        assert!(matches!(
            broken.value(),
            Err(OrchestratorError::AuthenticationFailure(_))
        ));
    }

    #[tokio::test]
    async fn client_secret_token_is_cached_per_scope() {
        let server = StubServer::respond(
            200,
            r#"{"token_type":"Bearer","expires_in":3599,"access_token":"tok-1"}"#,
        )
        .await;
        let credential = client_secret(&server.base_url);

        let first = credential.token(CredentialScope::Search).await.expect("token");
        let second = credential.token(CredentialScope::Search).await.expect("token");

        assert_eq!(first.expose(), "tok-1");
        assert_eq!(second.expose(), "tok-1");
        assert_eq!(server.hits(), 1);

        let request = server.requests().remove(0);
        assert!(request.starts_with("POST /tenant-1/oauth2/v2.0/token"));
        assert!(request.contains("grant_type=client_credentials"));
        assert!(request.contains("scope=https%3A%2F%2Fsearch.azure.com%2F.default"));
    }

    #[tokio::test]
    async fn nearly_expired_token_is_refreshed() {
        let server = StubServer::respond(
            200,
            r#"{"token_type":"Bearer","expires_in":60,"access_token":"short-lived"}"#,
        )
        .await;
        let credential = client_secret(&server.base_url);

        credential.token(CredentialScope::Generation).await.expect("token");
        credential.token(CredentialScope::Generation).await.expect("token");

        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn rejected_token_request_is_authentication_failure() {
        let server = StubServer::respond(
            401,
            r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#,
        )
        .await;
        let credential = client_secret(&server.base_url);

        let err = credential
            .token(CredentialScope::Generation)
            .await
            .expect_err("secret rejected");

        assert!(matches!(err, OrchestratorError::AuthenticationFailure(_)));
        assert!(err.to_string().contains("AADSTS7000215"));
    }

    #[tokio::test]
    async fn unreachable_authority_is_authentication_failure() {
        let server = StubServer::silent().await;
        let credential = ClientSecretCredential::new(
            &server.base_url,
            "tenant-1",
            "client-1",
            ApiKey::new("s3cret"),
            Duration::from_millis(100),
        )
        .expect("credential");

        let err = credential
            .token(CredentialScope::Search)
            .await
            .expect_err("authority never answers");
        assert!(matches!(err, OrchestratorError::AuthenticationFailure(_)));
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_from_header() {
        let credential = testing::FixedTokenCredential::shared(None);
        let err = credential
            .header(CredentialScope::Search)
            .await
            .expect_err("refresh fails");
        assert!(matches!(err, OrchestratorError::AuthenticationFailure(_)));
    }
}
