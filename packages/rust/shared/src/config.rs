//! Application configuration for ContentCrew.
//!
//! User config lives at `~/.contentcrew/contentcrew.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file: each credential is referenced by the
//! name of the environment variable that holds it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ContentCrewError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentcrew.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentcrew";

// ---------------------------------------------------------------------------
// Config structs (matching contentcrew.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Keyword-research (SpyFu) API settings.
    #[serde(default)]
    pub keyword_research: KeywordResearchConfig,

    /// Generative backends, one per provider.
    #[serde(default)]
    pub backends: BackendsConfig,

    /// Web search used as stage context.
    #[serde(default)]
    pub search: SearchConfig,

    /// The business the content is written for.
    #[serde(default)]
    pub business: BusinessConfig,

    /// Per-stage prompt overrides.
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root of the per-user output tree.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Maximum concurrent competitor-ranking lookups (1 = sequential).
    #[serde(default = "default_competitor_concurrency")]
    pub competitor_concurrency: u32,

    /// Timeout applied to every outbound HTTP request.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Age after which a run lock left by a crashed process is reclaimed.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            competitor_concurrency: default_competitor_concurrency(),
            http_timeout_secs: default_http_timeout(),
            lock_ttl_secs: default_lock_ttl(),
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}
fn default_competitor_concurrency() -> u32 {
    1
}
fn default_http_timeout() -> u64 {
    120
}
fn default_lock_ttl() -> u64 {
    6 * 60 * 60
}

/// `[keyword_research]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordResearchConfig {
    /// API origin.
    #[serde(default = "default_spyfu_base_url")]
    pub base_url: String,

    /// Env var holding the API id (Basic auth user).
    #[serde(default = "default_spyfu_id_env")]
    pub api_id_env: String,

    /// Env var holding the secret key (Basic auth password).
    #[serde(default = "default_spyfu_secret_env")]
    pub secret_key_env: String,

    /// Country the research is scoped to.
    #[serde(default = "default_country_code")]
    pub country_code: String,

    #[serde(default = "default_competitors_starting_row")]
    pub competitors_starting_row: u32,

    #[serde(default = "default_competitors_page_size")]
    pub competitors_page_size: u32,

    #[serde(default = "default_rankings_starting_row")]
    pub rankings_starting_row: u32,

    #[serde(default = "default_rankings_page_size")]
    pub rankings_page_size: u32,
}

impl Default for KeywordResearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_spyfu_base_url(),
            api_id_env: default_spyfu_id_env(),
            secret_key_env: default_spyfu_secret_env(),
            country_code: default_country_code(),
            competitors_starting_row: default_competitors_starting_row(),
            competitors_page_size: default_competitors_page_size(),
            rankings_starting_row: default_rankings_starting_row(),
            rankings_page_size: default_rankings_page_size(),
        }
    }
}

fn default_spyfu_base_url() -> String {
    "https://www.spyfu.com".into()
}
fn default_spyfu_id_env() -> String {
    "SPYFU_API_ID".into()
}
fn default_spyfu_secret_env() -> String {
    "SPYFU_SECRET_KEY".into()
}
fn default_country_code() -> String {
    "IN".into()
}
fn default_competitors_starting_row() -> u32 {
    2
}
fn default_competitors_page_size() -> u32 {
    5
}
fn default_rankings_starting_row() -> u32 {
    1
}
fn default_rankings_page_size() -> u32 {
    10
}

/// A single generative backend: model identifier plus credential key name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Provider model identifier.
    pub model: String,
    /// Name of the env var holding the API key (never store the key itself).
    pub api_key_env: String,
    /// API origin, overridable for proxies and tests.
    pub base_url: String,
}

/// `[backends.*]` sections. A table may set any subset of its fields; the rest
/// come from that provider's defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "BackendsFile")]
pub struct BackendsConfig {
    pub anthropic: BackendConfig,
    pub gemini: BackendConfig,
    pub openrouter: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            anthropic: default_anthropic(),
            gemini: default_gemini(),
            openrouter: default_openrouter(),
        }
    }
}

/// On-disk shape of `[backends.*]`, before provider defaults are applied.
#[derive(Debug, Default, Deserialize)]
struct BackendsFile {
    #[serde(default)]
    anthropic: BackendOverride,
    #[serde(default)]
    gemini: BackendOverride,
    #[serde(default)]
    openrouter: BackendOverride,
}

#[derive(Debug, Default, Deserialize)]
struct BackendOverride {
    model: Option<String>,
    api_key_env: Option<String>,
    base_url: Option<String>,
}

impl BackendOverride {
    fn apply_to(self, base: BackendConfig) -> BackendConfig {
        BackendConfig {
            model: self.model.unwrap_or(base.model),
            api_key_env: self.api_key_env.unwrap_or(base.api_key_env),
            base_url: self.base_url.unwrap_or(base.base_url),
        }
    }
}

impl From<BackendsFile> for BackendsConfig {
    fn from(file: BackendsFile) -> Self {
        Self {
            anthropic: file.anthropic.apply_to(default_anthropic()),
            gemini: file.gemini.apply_to(default_gemini()),
            openrouter: file.openrouter.apply_to(default_openrouter()),
        }
    }
}

fn default_anthropic() -> BackendConfig {
    BackendConfig {
        model: "claude-3-5-sonnet-20241022".into(),
        api_key_env: "ANTHROPIC_API_KEY".into(),
        base_url: "https://api.anthropic.com".into(),
    }
}
fn default_gemini() -> BackendConfig {
    BackendConfig {
        model: "gemini-2.0-flash-exp".into(),
        api_key_env: "GEMINI_API_KEY".into(),
        base_url: "https://generativelanguage.googleapis.com".into(),
    }
}
fn default_openrouter() -> BackendConfig {
    BackendConfig {
        model: "deepseek/deepseek-r1".into(),
        api_key_env: "OPENROUTER_API_KEY".into(),
        base_url: "https://openrouter.ai/api".into(),
    }
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Env var holding the Serper API key. Search is skipped when unset.
    #[serde(default = "default_serper_env")]
    pub api_key_env: String,

    #[serde(default = "default_serper_base_url")]
    pub base_url: String,

    /// Organic results rendered into a stage's context.
    #[serde(default = "default_search_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_serper_env(),
            base_url: default_serper_base_url(),
            max_results: default_search_results(),
        }
    }
}

fn default_serper_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_serper_base_url() -> String {
    "https://google.serper.dev".into()
}
fn default_search_results() -> usize {
    8
}

/// `[business]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Name used by the standalone blog stages (which take no school name).
    #[serde(default)]
    pub name: String,

    /// Pages fed to the outline and blog stages as reference material.
    #[serde(default)]
    pub reference_urls: Vec<String>,

    /// Characters of each reference page kept as stage context.
    #[serde(default = "default_reference_max_chars")]
    pub reference_max_chars: usize,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            reference_urls: Vec::new(),
            reference_max_chars: default_reference_max_chars(),
        }
    }
}

fn default_reference_max_chars() -> usize {
    12_000
}

/// `[prompts]` section. Any stage left unset uses its built-in template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_copy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_outline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_post: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crew_blog_post: Option<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentcrew/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContentCrewError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentcrew/contentcrew.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentCrewError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ContentCrewError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContentCrewError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ContentCrewError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContentCrewError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a credential from the environment. Missing or empty is a config error.
pub fn read_env_credential(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ContentCrewError::config(format!(
            "{var_name} is not set. Add it to the environment or a .env file."
        ))),
    }
}
