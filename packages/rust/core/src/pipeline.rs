//! Pipeline entry points: keyword research + analysis, keyword selection,
//! SEO content, and the two blog variants.
//!
//! Each entry point is independent. Ordering between them (analysis before
//! selection before SEO) is the caller's responsibility; a stage whose input
//! artifact is missing fails with `NotFound`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use contentcrew_generation::Backends;
use contentcrew_keywords::KeywordResearchClient;
use contentcrew_shared::{
    AppConfig, CompetitorRankingsMap, ContentCrewError, Result, UserId,
};
use contentcrew_storage::{ArtifactPath, OutputStore, Workspace};

use crate::selection::{self, AvailableKeywords};
use crate::stage::{
    ContentGenerationStage, ContextTools, PromptVars, StageContext, StageDefinition, StageOutput,
};
use crate::stages;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of [`Pipeline::run_analysis`].
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub user_id: UserId,
    /// Competitor domains in upstream order.
    pub competitors: Vec<String>,
    /// Keywords fetched for the user's own domain.
    pub user_keyword_count: usize,
    pub analysis: StageOutput,
    pub elapsed: Duration,
}

/// Result of [`Pipeline::run_seo`].
#[derive(Debug, Clone)]
pub struct SeoReport {
    pub user_id: UserId,
    pub ad_copies: StageOutput,
    pub outlines: StageOutput,
    pub elapsed: Duration,
}

/// Result of [`Pipeline::run_blog`] and [`Pipeline::run_crew_blog`].
#[derive(Debug, Clone)]
pub struct BlogReport {
    pub user_id: UserId,
    pub post: StageOutput,
    pub elapsed: Duration,
}

/// Result of [`Pipeline::save_keyword_details`].
#[derive(Debug, Clone)]
pub struct SelectionReport {
    pub path: PathBuf,
    pub selected: Vec<String>,
    pub unmatched: Vec<String>,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a competitor's rankings have been fetched.
    fn competitor_fetched(&self, domain: &str, current: usize, total: usize);
    /// Called when a stage has written its output.
    fn stage_done(&self, output: &StageOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn competitor_fetched(&self, _domain: &str, _current: usize, _total: usize) {}
    fn stage_done(&self, _output: &StageOutput) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Owns everything the entry points need. Built once and reused.
pub struct Pipeline {
    config: AppConfig,
    store: OutputStore,
    backends: Backends,
    tools: ContextTools,
    keywords: Option<KeywordResearchClient>,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        store: OutputStore,
        backends: Backends,
        tools: ContextTools,
    ) -> Self {
        Self {
            config,
            store,
            backends,
            tools,
            keywords: None,
        }
    }

    /// Standard wiring from config: output root, backends and tools.
    /// The keyword client is built on first use.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store = OutputStore::new(&config.defaults.output_dir)
            .with_lock_ttl(Duration::from_secs(config.defaults.lock_ttl_secs));
        let backends = Backends::from_config(&config)?;
        let tools = ContextTools::from_config(&config)?;
        Ok(Self::new(config, store, backends, tools))
    }

    /// Use a specific keyword client instead of one built from config.
    pub fn with_keyword_client(mut self, client: KeywordResearchClient) -> Self {
        self.keywords = Some(client);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    fn keyword_client(&self) -> Result<KeywordResearchClient> {
        match &self.keywords {
            Some(client) => Ok(client.clone()),
            None => KeywordResearchClient::from_config(&self.config),
        }
    }

    fn business_name(&self, fallback: Option<&str>) -> String {
        let name = self.config.business.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        match fallback {
            Some(f) if !f.trim().is_empty() => f.trim().to_string(),
            _ => {
                warn!("business.name is not configured");
                "the school".to_string()
            }
        }
    }

    fn school_vars(&self, school_name: &str, domain_url: &str) -> PromptVars {
        PromptVars::new()
            .with("school_name", school_name)
            .with("domain_url", domain_url)
            .with("business_name", self.business_name(Some(school_name)))
            .with("reference_urls", self.config.business.reference_urls.join("\n"))
    }

    fn outline_vars(&self, outline: &str) -> PromptVars {
        PromptVars::new()
            .with("outline", outline)
            .with("topic", outline_topic(outline))
            .with("business_name", self.business_name(None))
            .with("reference_urls", self.config.business.reference_urls.join("\n"))
    }

    async fn run_stage(
        &self,
        stage: &ContentGenerationStage,
        workspace: &Workspace,
        vars: &PromptVars,
        prior: &BTreeMap<String, String>,
        progress: &dyn ProgressReporter,
    ) -> Result<StageOutput> {
        progress.phase(&format!("Running {}", stage.name()));
        let ctx = StageContext {
            workspace,
            backends: &self.backends,
            tools: &self.tools,
            vars,
            prior,
        };
        let output = stage.run(&ctx).await?;
        progress.stage_done(&output);
        Ok(output)
    }

    // -----------------------------------------------------------------------
    // Analysis
    // -----------------------------------------------------------------------

    /// Fetch rankings for the user's domain and its competitors, then run the
    /// keyword analysis stage.
    #[instrument(skip_all, fields(user_id = %user_id, domain = %domain_url))]
    pub async fn run_analysis(
        &self,
        user_id: &UserId,
        school_name: &str,
        domain_url: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<AnalysisReport> {
        let start = Instant::now();
        let client = self.keyword_client()?;
        let workspace = self.store.ensure_workspace(user_id)?;
        let _lock = workspace.lock()?;

        info!("starting analysis pipeline");

        progress.phase("Fetching user rankings");
        let user_rankings = client.fetch_keyword_rankings(domain_url).await?;
        workspace.write_json(ArtifactPath::UserRankings, &user_rankings)?;

        progress.phase("Fetching competitors");
        let competitors = client.fetch_top_competitors(domain_url).await?;
        workspace.write_json(ArtifactPath::Competitors, &competitors)?;

        let domains = dedup_in_order(competitors.domains());
        progress.phase("Fetching competitor rankings");
        let rankings = self
            .fetch_competitor_rankings(&client, &domains, progress)
            .await?;
        workspace.write_json(ArtifactPath::CompetitorRankings, &rankings)?;

        let stage = ContentGenerationStage::new(stages::keyword_analysis(&self.config));
        let vars = self.school_vars(school_name, domain_url);
        let analysis = self
            .run_stage(&stage, &workspace, &vars, &BTreeMap::new(), progress)
            .await?;

        let report = AnalysisReport {
            user_id: user_id.clone(),
            competitors: domains,
            user_keyword_count: user_rankings.results.len(),
            analysis,
            elapsed: start.elapsed(),
        };
        info!(
            competitors = report.competitors.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "analysis pipeline complete"
        );
        Ok(report)
    }

    /// One rankings call per competitor with at most `competitor_concurrency`
    /// in flight. Results are collected in submission order; the first
    /// failure aborts the rest.
    async fn fetch_competitor_rankings(
        &self,
        client: &KeywordResearchClient,
        domains: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<CompetitorRankingsMap> {
        let permits = self.config.defaults.competitor_concurrency.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut handles = Vec::with_capacity(domains.len());

        for domain in domains {
            let sem = semaphore.clone();
            let client = client.clone();
            let domain = domain.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.map_err(|_| {
                    ContentCrewError::Network("competitor fetch was cancelled".into())
                })?;
                let rankings = client.fetch_keyword_rankings(&domain).await?;
                Ok::<_, ContentCrewError>((domain, rankings))
            }));
        }

        let total = handles.len();
        let mut map = CompetitorRankingsMap::new();
        let mut pending = handles.into_iter();
        let mut current = 0;

        while let Some(handle) = pending.next() {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ContentCrewError::Network(format!("competitor task failed: {e}"))),
            };
            match outcome {
                Ok((domain, rankings)) => {
                    current += 1;
                    progress.competitor_fetched(&domain, current, total);
                    map.insert(domain, rankings);
                }
                Err(e) => {
                    for rest in pending {
                        rest.abort();
                    }
                    return Err(e);
                }
            }
        }

        Ok(map)
    }

    // -----------------------------------------------------------------------
    // Keyword selection
    // -----------------------------------------------------------------------

    /// Unique keywords per competitor domain from the stored rankings.
    pub fn available_keywords(&self, user_id: &UserId) -> Result<AvailableKeywords> {
        let workspace = self.store.open_workspace(user_id)?;
        let rankings: CompetitorRankingsMap =
            workspace.read_json(ArtifactPath::CompetitorRankings)?;
        Ok(selection::available_keywords(&rankings))
    }

    /// Persist the details of the selected keywords for the SEO stages.
    #[instrument(skip_all, fields(user_id = %user_id, selected = selected.len()))]
    pub fn save_keyword_details(
        &self,
        user_id: &UserId,
        selected: &[String],
    ) -> Result<SelectionReport> {
        let workspace = self.store.open_workspace(user_id)?;
        let _lock = workspace.lock()?;
        let rankings: CompetitorRankingsMap =
            workspace.read_json(ArtifactPath::CompetitorRankings)?;

        let selection = selection::build_selected_keyword_details(&rankings, selected)?;
        for keyword in &selection.unmatched {
            warn!(%keyword, "selected keyword not found in competitor rankings");
        }
        let path = workspace.write_json(ArtifactPath::SelectedKeywordDetails, &selection.details)?;

        info!(saved = selection.details.len(), "keyword details saved");
        Ok(SelectionReport {
            path,
            selected: selection.details.keys().cloned().collect(),
            unmatched: selection.unmatched,
        })
    }

    // -----------------------------------------------------------------------
    // SEO
    // -----------------------------------------------------------------------

    /// Ad copy, then blog outlines built on it.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn run_seo(
        &self,
        user_id: &UserId,
        school_name: &str,
        domain_url: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<SeoReport> {
        let start = Instant::now();
        let workspace = self.store.ensure_workspace(user_id)?;
        let _lock = workspace.lock()?;
        let vars = self.school_vars(school_name, domain_url);

        let mut prior = BTreeMap::new();
        let ad_copy = ContentGenerationStage::new(stages::ad_copy(&self.config));
        let ad_copies = self
            .run_stage(&ad_copy, &workspace, &vars, &prior, progress)
            .await?;
        prior.insert(ad_copies.stage.clone(), ad_copies.content.clone());

        let outline = ContentGenerationStage::new(stages::blog_outline(&self.config));
        let outlines = self
            .run_stage(&outline, &workspace, &vars, &prior, progress)
            .await?;

        Ok(SeoReport {
            user_id: user_id.clone(),
            ad_copies,
            outlines,
            elapsed: start.elapsed(),
        })
    }

    // -----------------------------------------------------------------------
    // Blog
    // -----------------------------------------------------------------------

    /// Search-grounded blog post from a caller-supplied outline.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn run_blog(
        &self,
        user_id: &UserId,
        outline: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<BlogReport> {
        self.run_outline_stage(user_id, outline, stages::blog_post(&self.config), progress)
            .await
    }

    /// Blog post written with reference pages and web search as context.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn run_crew_blog(
        &self,
        user_id: &UserId,
        outline: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<BlogReport> {
        self.run_outline_stage(user_id, outline, stages::crew_blog_post(&self.config), progress)
            .await
    }

    async fn run_outline_stage(
        &self,
        user_id: &UserId,
        outline: &str,
        definition: StageDefinition,
        progress: &dyn ProgressReporter,
    ) -> Result<BlogReport> {
        if outline.trim().is_empty() {
            return Err(ContentCrewError::validation("blog outline is empty"));
        }
        let start = Instant::now();
        let workspace = self.store.ensure_workspace(user_id)?;
        let _lock = workspace.lock()?;

        let stage = ContentGenerationStage::new(definition);
        let vars = self.outline_vars(outline);
        let post = self
            .run_stage(&stage, &workspace, &vars, &BTreeMap::new(), progress)
            .await?;

        Ok(BlogReport {
            user_id: user_id.clone(),
            post,
            elapsed: start.elapsed(),
        })
    }
}

fn dedup_in_order(domains: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(domains.len());
    for d in domains {
        if !out.contains(&d) {
            out.push(d);
        }
    }
    out
}

/// First non-empty outline line without Markdown heading or list markers.
fn outline_topic(outline: &str) -> String {
    outline
        .lines()
        .map(|l| l.trim().trim_start_matches(['#', '-', '*']).trim())
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}
