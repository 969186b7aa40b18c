//! Keyword and competitor research client (SpyFu PPC APIs).
//!
//! Two read-only endpoints are used: the top-competitors list for a domain and
//! the most successful paid keywords for a domain. Both are single GET requests
//! with HTTP Basic auth; there is no retry and no rate limiting.

use std::time::Duration;

use contentcrew_shared::{
    AppConfig, CompetitorList, ContentCrewError, KeywordRecord, KeywordResearchConfig,
    RankingsResult, Result, read_env_credential,
};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Path of the top-competitors endpoint.
const COMPETITORS_PATH: &str = "/apis/competitors_api/v2/ppc/getTopCompetitors";

/// Path of the most-successful-keywords endpoint.
const RANKINGS_PATH: &str = "/apis/keyword_api/v2/ppc/getMostSuccessful";

/// Default timeout in seconds for keyword API calls.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// User-Agent string for keyword API requests.
const USER_AGENT: &str = concat!("ContentCrew/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Credentials & options
// ---------------------------------------------------------------------------

/// Basic-auth credentials for the keyword API.
#[derive(Clone)]
pub struct Credentials {
    pub api_id: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read both credential values from the environment variables named in config.
    pub fn from_env(config: &KeywordResearchConfig) -> Result<Self> {
        Ok(Self {
            api_id: read_env_credential(&config.api_id_env)?,
            secret_key: read_env_credential(&config.secret_key_env)?,
        })
    }
}

/// Request shaping for the keyword API.
#[derive(Debug, Clone)]
pub struct ResearchOptions {
    pub base_url: String,
    pub country_code: String,
    pub competitors_starting_row: u32,
    pub competitors_page_size: u32,
    pub rankings_starting_row: u32,
    pub rankings_page_size: u32,
    pub timeout_secs: u64,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self::from(&KeywordResearchConfig::default())
    }
}

impl From<&KeywordResearchConfig> for ResearchOptions {
    fn from(config: &KeywordResearchConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            country_code: config.country_code.clone(),
            competitors_starting_row: config.competitors_starting_row,
            competitors_page_size: config.competitors_page_size,
            rankings_starting_row: config.rankings_starting_row,
            rankings_page_size: config.rankings_page_size,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin HTTP client over the keyword-research API.
#[derive(Debug, Clone)]
pub struct KeywordResearchClient {
    client: Client,
    credentials: Credentials,
    options: ResearchOptions,
}

impl KeywordResearchClient {
    /// Build a client with explicit credentials.
    pub fn new(options: ResearchOptions, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| {
                ContentCrewError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            credentials,
            options,
        })
    }

    /// Build a client from application config, reading credentials from the environment.
    ///
    /// Fails with a config error if either credential is absent.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let credentials = Credentials::from_env(&config.keyword_research)?;
        let mut options = ResearchOptions::from(&config.keyword_research);
        options.timeout_secs = config.defaults.http_timeout_secs;
        Self::new(options, credentials)
    }

    /// Fetch the top paid-search competitors of `domain`.
    #[instrument(skip(self))]
    pub async fn fetch_top_competitors(&self, domain: &str) -> Result<CompetitorList> {
        let domain = clean_domain(domain);
        let starting_row = self.options.competitors_starting_row.to_string();
        let page_size = self.options.competitors_page_size.to_string();

        let body = self
            .get(
                COMPETITORS_PATH,
                &[
                    ("domain", domain.as_str()),
                    ("startingRow", starting_row.as_str()),
                    ("pageSize", page_size.as_str()),
                    ("countryCode", self.options.country_code.as_str()),
                ],
            )
            .await?;

        let list: CompetitorList = serde_json::from_value(body).map_err(|e| {
            ContentCrewError::parse(format!("unexpected competitors payload: {e}"))
        })?;

        info!(%domain, competitors = list.results.len(), "fetched top competitors");
        Ok(list)
    }

    /// Fetch the most successful paid keywords for `domain`, projected to
    /// the six tracked fields.
    #[instrument(skip(self))]
    pub async fn fetch_keyword_rankings(&self, domain: &str) -> Result<RankingsResult> {
        let domain = clean_domain(domain);
        let starting_row = self.options.rankings_starting_row.to_string();
        let page_size = self.options.rankings_page_size.to_string();

        let body = self
            .get(
                RANKINGS_PATH,
                &[
                    ("query", domain.as_str()),
                    ("startingRow", starting_row.as_str()),
                    ("pageSize", page_size.as_str()),
                    ("countryCode", self.options.country_code.as_str()),
                ],
            )
            .await?;

        let rankings = project_rankings(&body);
        info!(%domain, keywords = rankings.results.len(), "fetched keyword rankings");
        Ok(rankings)
    }

    /// Issue one authenticated GET and decode the JSON body.
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}{path}", self.options.base_url);
        debug!(%url, ?query, "keyword API request");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.api_id, Some(&self.credentials.secret_key))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| ContentCrewError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ContentCrewError::Network(format!("{url}: failed to read body: {e}")))?;

        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "keyword API returned an error");
            return Err(ContentCrewError::UpstreamHttp {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| ContentCrewError::parse(format!("{url}: invalid JSON body: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Strip the protocol prefix and surrounding slashes/spaces from a domain.
pub fn clean_domain(domain: &str) -> String {
    domain
        .replace("https://", "")
        .replace("http://", "")
        .trim_matches(|c| c == '/' || c == ' ')
        .to_string()
}

/// Project a raw rankings payload. `resultCount` is copied as-is from upstream.
pub fn project_rankings(raw: &Value) -> RankingsResult {
    let results = raw
        .get("results")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(KeywordRecord::project).collect())
        .unwrap_or_default();

    RankingsResult {
        result_count: raw.get("resultCount").and_then(Value::as_number).cloned(),
        results,
    }
}
