//! Generative-language backends and the context tools stages draw on.
//!
//! Every provider implements [`GenerativeBackend`]. Stages never construct a
//! backend themselves: a [`Backends`] registry is built once from
//! [`AppConfig`] and injected, which keeps tests free to substitute fakes.
//!
//! Credentials are resolved at call time, so a missing generative API key only
//! fails the first stage that needs it.

mod anthropic;
mod gemini;
mod openrouter;
pub mod search;
mod types;
pub mod website;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use contentcrew_shared::{AppConfig, ContentCrewError, Result, read_env_credential};
use reqwest::Client;

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;
pub use openrouter::OpenRouterBackend;
pub use search::{SearchResult, SerperSearch};
pub use types::{
    Generation, GenerationRequest, Grounding, GroundingSource, Message, ResponsePart, Role,
};
pub use website::{WebPage, WebsiteReader};

/// User-Agent string for all outbound generation/tool requests.
pub(crate) const USER_AGENT: &str = concat!("ContentCrew/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// One generative-language provider bound to a model.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Model identifier, for logs and reports.
    fn model(&self) -> &str;

    /// Run one completion.
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}

/// Which provider a stage is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Anthropic,
    Gemini,
    OpenRouter,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Where a backend's API key comes from.
#[derive(Clone)]
pub enum ApiKey {
    /// Read from this environment variable at call time.
    Env(String),
    /// Given directly (tests, embedding callers).
    Literal(String),
}

impl ApiKey {
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Env(var) => read_env_credential(var),
            Self::Literal(key) if key.trim().is_empty() => {
                Err(ContentCrewError::config("API key is empty"))
            }
            Self::Literal(key) => Ok(key.clone()),
        }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env(var) => f.debug_tuple("Env").field(var).finish(),
            Self::Literal(_) => f.debug_tuple("Literal").field(&"<redacted>").finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Backends available to stages, keyed by provider.
#[derive(Clone, Default)]
pub struct Backends {
    inner: HashMap<BackendKind, Arc<dyn GenerativeBackend>>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured provider. No credential is read here.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = http_client(config.defaults.http_timeout_secs)?;
        let b = &config.backends;

        Ok(Self::new()
            .with(
                BackendKind::Anthropic,
                Arc::new(AnthropicBackend::new(
                    client.clone(),
                    &b.anthropic.base_url,
                    &b.anthropic.model,
                    ApiKey::Env(b.anthropic.api_key_env.clone()),
                )),
            )
            .with(
                BackendKind::Gemini,
                Arc::new(GeminiBackend::new(
                    client.clone(),
                    &b.gemini.base_url,
                    &b.gemini.model,
                    ApiKey::Env(b.gemini.api_key_env.clone()),
                )),
            )
            .with(
                BackendKind::OpenRouter,
                Arc::new(OpenRouterBackend::new(
                    client,
                    &b.openrouter.base_url,
                    &b.openrouter.model,
                    ApiKey::Env(b.openrouter.api_key_env.clone()),
                )),
            ))
    }

    /// Bind (or replace) the backend for `kind`.
    pub fn with(mut self, kind: BackendKind, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.inner.insert(kind, backend);
        self
    }

    pub fn get(&self, kind: BackendKind) -> Result<Arc<dyn GenerativeBackend>> {
        self.inner.get(&kind).cloned().ok_or_else(|| {
            ContentCrewError::config(format!("no generative backend configured for {kind}"))
        })
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (kind, backend) in &self.inner {
            map.entry(kind, &backend.model());
        }
        map.finish()
    }
}

/// Build a reqwest client with the crate's user agent and timeout.
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ContentCrewError::Network(format!("failed to build HTTP client: {e}")))
}

/// Read a non-success response into an upstream error.
pub(crate) async fn upstream_error(response: reqwest::Response) -> ContentCrewError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    ContentCrewError::UpstreamHttp { status, body }
}
