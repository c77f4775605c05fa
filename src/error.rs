use thiserror::Error;

/// Failures a single chat request can end with. None of them are retried.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("Query must not be empty")]
    EmptyQuery,
}

impl OrchestratorError {
    pub fn backend(context: &str, err: impl std::fmt::Display) -> Self {
        Self::BackendUnavailable(format!("{context}: {err}"))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure(_) => "authentication_failure",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::UnknownAgent(_) => "unknown_agent",
            Self::EmptyQuery => "empty_query",
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
