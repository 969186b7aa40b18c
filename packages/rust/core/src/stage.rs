//! A single content-generation stage: resolve inputs, prompt a backend,
//! persist the answer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use contentcrew_generation::search::render_results;
use contentcrew_generation::{
    BackendKind, Backends, Generation, GenerationRequest, Message, SerperSearch, WebsiteReader,
};
use contentcrew_shared::{AppConfig, ContentCrewError, Result};
use contentcrew_storage::{ArtifactPath, Workspace};
use tracing::{debug, info, instrument, warn};

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// A read-only input to a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum InputBinding {
    /// A workspace artifact. Missing file is an error.
    Artifact {
        label: String,
        artifact: ArtifactPath,
    },
    /// Caller-supplied text.
    Text { label: String, value: String },
    /// Output of an earlier stage in the same run.
    PriorOutput { stage: String },
    /// A reference page, fetched and converted to Markdown. Best effort.
    Website { url: String },
    /// Web search results for a templated query. Best effort.
    WebSearch { query: String },
}

impl InputBinding {
    pub fn artifact(label: &str, artifact: ArtifactPath) -> Self {
        Self::Artifact {
            label: label.to_string(),
            artifact,
        }
    }

    pub fn text(label: &str, value: impl Into<String>) -> Self {
        Self::Text {
            label: label.to_string(),
            value: value.into(),
        }
    }

    pub fn prior(stage: &str) -> Self {
        Self::PriorOutput {
            stage: stage.to_string(),
        }
    }
}

/// A search-grounded first call whose answer seeds the main call.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundingStep {
    pub template: String,
    pub temperature: Option<f32>,
    /// Transcript of the grounding response.
    pub log: ArtifactPath,
}

/// Declarative description of a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDefinition {
    pub name: String,
    pub backend: BackendKind,
    pub system: Option<String>,
    pub template: String,
    pub inputs: Vec<InputBinding>,
    pub grounding: Option<GroundingStep>,
    /// Transcript of the main response (parts + search widget).
    pub transcript: Option<ArtifactPath>,
    pub output: ArtifactPath,
    pub temperature: Option<f32>,
    pub max_output_tokens: u32,
}

// ---------------------------------------------------------------------------
// Runtime context
// ---------------------------------------------------------------------------

/// Named values substituted into `{name}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptVars {
    values: BTreeMap<String, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Optional context tools. Absent tools make the matching bindings no-ops.
#[derive(Debug, Clone, Default)]
pub struct ContextTools {
    pub website: Option<WebsiteReader>,
    pub search: Option<SerperSearch>,
}

impl ContextTools {
    pub fn none() -> Self {
        Self::default()
    }

    /// Website reader always, capped at `business.reference_max_chars`;
    /// search only when its key is present.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = contentcrew_generation::http_client(config.defaults.http_timeout_secs)?;
        let search = SerperSearch::from_config(client.clone(), &config.search);
        let search = if search.is_configured() {
            Some(search)
        } else {
            debug!(env = %config.search.api_key_env, "web search disabled: no API key");
            None
        };
        let website =
            WebsiteReader::new(client).with_max_chars(config.business.reference_max_chars);
        Ok(Self {
            website: Some(website),
            search,
        })
    }
}

/// Everything a stage needs to run.
pub struct StageContext<'a> {
    pub workspace: &'a Workspace,
    pub backends: &'a Backends,
    pub tools: &'a ContextTools,
    pub vars: &'a PromptVars,
    /// Outputs of stages already run in this invocation, by stage name.
    pub prior: &'a BTreeMap<String, String>,
}

/// A persisted stage result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub stage: String,
    pub artifact: ArtifactPath,
    pub path: PathBuf,
    pub content: String,
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ContentGenerationStage {
    definition: StageDefinition,
}

impl ContentGenerationStage {
    pub fn new(definition: StageDefinition) -> Self {
        Self { definition }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    #[instrument(
        skip_all,
        fields(stage = %self.definition.name, backend = %self.definition.backend)
    )]
    pub async fn run(&self, ctx: &StageContext<'_>) -> Result<StageOutput> {
        let def = &self.definition;
        let backend = ctx.backends.get(def.backend)?;

        let blocks = self.resolve_inputs(ctx).await?;
        let prompt = compose_prompt(&render_template(&def.template, ctx.vars), &blocks);
        debug!(chars = prompt.len(), blocks = blocks.len(), "prompt assembled");

        let mut tokens_in = 0;
        let mut tokens_out = 0;
        let mut history = Vec::new();
        let mut grounding_log = None;

        if let Some(step) = &def.grounding {
            let search_prompt = render_template(&step.template, ctx.vars);
            let mut request = GenerationRequest::new(search_prompt.clone())
                .with_max_output_tokens(def.max_output_tokens)
                .with_web_search(true);
            if let Some(t) = step.temperature {
                request = request.with_temperature(t);
            }

            let grounded = backend
                .generate(&request)
                .await
                .map_err(|e| e.into_generation(&format!("{} grounding call", def.name)))?;
            ensure_content(&def.name, &grounded)?;

            tokens_in += grounded.tokens_in;
            tokens_out += grounded.tokens_out;
            let sources = grounded.grounding.as_ref().map_or(0, |g| g.sources.len());
            info!(sources, "grounding complete");

            history.push(Message::user(search_prompt));
            history.push(Message::model(grounded.text()));
            grounding_log = Some((step.log, grounded.render_transcript()));
        }

        let mut request = GenerationRequest::new(prompt)
            .with_history(history)
            .with_max_output_tokens(def.max_output_tokens);
        if let Some(system) = &def.system {
            request = request.with_system(system.clone());
        }
        if let Some(t) = def.temperature {
            request = request.with_temperature(t);
        }

        let generation = backend
            .generate(&request)
            .await
            .map_err(|e| e.into_generation(&format!("{} call", def.name)))?;
        ensure_content(&def.name, &generation)?;

        tokens_in += generation.tokens_in;
        tokens_out += generation.tokens_out;

        // Nothing is written until every call has succeeded.
        if let Some((log, transcript)) = grounding_log {
            ctx.workspace.write_artifact(log, &transcript)?;
        }
        if let Some(transcript) = def.transcript {
            ctx.workspace
                .write_artifact(transcript, &generation.render_transcript())?;
        }

        let content = generation.text();
        let path = ctx.workspace.write_artifact(def.output, &content)?;

        info!(
            output = %def.output,
            model = %generation.model,
            tokens_in,
            tokens_out,
            "stage complete"
        );

        Ok(StageOutput {
            stage: def.name.clone(),
            artifact: def.output,
            path,
            content,
            model: generation.model,
            tokens_in,
            tokens_out,
        })
    }

    async fn resolve_inputs(&self, ctx: &StageContext<'_>) -> Result<Vec<String>> {
        let mut blocks = Vec::with_capacity(self.definition.inputs.len());

        for binding in &self.definition.inputs {
            match binding {
                InputBinding::Artifact { label, artifact } => {
                    let content = ctx.workspace.read_artifact(*artifact)?;
                    blocks.push(labelled(&format!("{label} ({artifact})"), &content));
                }
                InputBinding::Text { label, value } => {
                    blocks.push(labelled(label, value));
                }
                InputBinding::PriorOutput { stage } => {
                    let content = ctx.prior.get(stage).ok_or_else(|| {
                        ContentCrewError::validation(format!(
                            "stage '{}' needs the output of '{stage}', which has not run",
                            self.definition.name
                        ))
                    })?;
                    blocks.push(labelled(&format!("Output of {stage}"), content));
                }
                InputBinding::Website { url } => {
                    let Some(reader) = &ctx.tools.website else {
                        debug!(%url, "website reader disabled, skipping");
                        continue;
                    };
                    match reader.read(url).await {
                        Ok(page) => blocks.push(labelled("Reference page", &page.to_context())),
                        Err(e) => warn!(%url, error = %e, "reference page unavailable, skipping"),
                    }
                }
                InputBinding::WebSearch { query } => {
                    let query = render_template(query, ctx.vars);
                    let Some(search) = &ctx.tools.search else {
                        warn!(%query, "web search not configured, skipping");
                        continue;
                    };
                    match search.search(&query).await {
                        Ok(results) => {
                            blocks.push(labelled("Web search", &render_results(&query, &results)));
                        }
                        Err(e) => warn!(%query, error = %e, "web search failed, skipping"),
                    }
                }
            }
        }

        Ok(blocks)
    }
}

fn ensure_content(stage: &str, generation: &Generation) -> Result<()> {
    if generation.is_empty() {
        return Err(ContentCrewError::Generation(format!(
            "{stage}: {} returned no content (finish reason: {})",
            if generation.model.is_empty() { "backend" } else { generation.model.as_str() },
            generation.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(())
}

fn labelled(label: &str, content: &str) -> String {
    format!("## {label}\n\n{}", content.trim_end())
}

fn compose_prompt(instructions: &str, blocks: &[String]) -> String {
    if blocks.is_empty() {
        return instructions.to_string();
    }
    format!("{instructions}\n\n# Context\n\n{}", blocks.join("\n\n"))
}

/// Replace `{name}` placeholders in one pass. Unknown placeholders are left
/// as-is, and substituted text is never rescanned.
pub fn render_template(template: &str, vars: &PromptVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder(&after[..close]) => {
                let key = &after[..close];
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_placeholder(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingBackend, ScriptedBackend, temp_store};
    use contentcrew_shared::UserId;
    use std::sync::Arc;

    fn definition(output: ArtifactPath) -> StageDefinition {
        StageDefinition {
            name: "test_stage".into(),
            backend: BackendKind::Anthropic,
            system: Some("system role".into()),
            template: "Write about {school_name}.".into(),
            inputs: vec![],
            grounding: None,
            transcript: None,
            output,
            temperature: None,
            max_output_tokens: 1024,
        }
    }

    #[test]
    fn template_substitution() {
        let vars = PromptVars::new()
            .with("school_name", "Green Valley")
            .with("outline", "{school_name}");
        assert_eq!(
            render_template("{school_name}: {outline} {unknown} {not a key} {", &vars),
            "Green Valley: {school_name} {unknown} {not a key} {"
        );
    }

    #[tokio::test]
    async fn run_resolves_inputs_and_writes_output() {
        let (root, store) = temp_store();
        let ws = store.ensure_workspace(&UserId::parse("u1").unwrap()).unwrap();
        ws.write_artifact(ArtifactPath::UserRankings, "{\"resultCount\": 1}").unwrap();

        let backend = Arc::new(ScriptedBackend::new(["# Analysis"]));
        let backends = Backends::new().with(BackendKind::Anthropic, backend.clone());

        let mut def = definition(ArtifactPath::Analysis);
        def.inputs = vec![
            InputBinding::artifact("User rankings", ArtifactPath::UserRankings),
            InputBinding::text("Note", "be brief"),
            InputBinding::prior("earlier"),
            InputBinding::WebSearch { query: "q".into() },
        ];
        let prior = BTreeMap::from([("earlier".to_string(), "earlier text".to_string())]);
        let vars = PromptVars::new().with("school_name", "Green Valley");
        let ctx = StageContext {
            workspace: &ws,
            backends: &backends,
            tools: &ContextTools::none(),
            vars: &vars,
            prior: &prior,
        };

        let out = ContentGenerationStage::new(def).run(&ctx).await.unwrap();
        assert_eq!(out.content, "# Analysis");
        assert_eq!(ws.read_artifact(ArtifactPath::Analysis).unwrap(), "# Analysis");

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[0].text;
        assert!(prompt.starts_with("Write about Green Valley."));
        assert!(
            prompt.contains("## User rankings (data/user_rankings.json)\n\n{\"resultCount\": 1}")
        );
        assert!(prompt.contains("## Note\n\nbe brief"));
        assert!(prompt.contains("## Output of earlier\n\nearlier text"));
        assert_eq!(requests[0].system.as_deref(), Some("system role"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn reference_pages_are_capped_by_config() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let page = format!(
            "<html><body><main><p>{}</p></main></body></html>",
            "admissions ".repeat(200)
        );
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let mut config = AppConfig::default();
        config.business.reference_max_chars = 40;
        config.search.api_key_env = "CC_TEST_UNSET_SERPER_KEY".into();
        let tools = ContextTools::from_config(&config).unwrap();
        assert!(tools.search.is_none());

        let (root, store) = temp_store();
        let ws = store.ensure_workspace(&UserId::parse("u1").unwrap()).unwrap();
        let backend = Arc::new(ScriptedBackend::new(["done"]));
        let backends = Backends::new().with(BackendKind::Anthropic, backend.clone());

        let mut def = definition(ArtifactPath::BlogPostOutlines);
        def.inputs = vec![InputBinding::Website { url: server.uri() }];
        let ctx = StageContext {
            workspace: &ws,
            backends: &backends,
            tools: &tools,
            vars: &PromptVars::new(),
            prior: &BTreeMap::new(),
        };
        ContentGenerationStage::new(def).run(&ctx).await.unwrap();

        let prompt = backend.requests()[0].messages[0].text.clone();
        assert!(prompt.contains("## Reference page"));
        assert!(prompt.contains("[... content truncated"));
        assert!(!prompt.contains(&"admissions ".repeat(10)));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn missing_artifact_input_is_not_found() {
        let (root, store) = temp_store();
        let ws = store.ensure_workspace(&UserId::parse("u1").unwrap()).unwrap();
        let backends = Backends::new()
            .with(BackendKind::Anthropic, Arc::new(ScriptedBackend::new(["unused"])));

        let mut def = definition(ArtifactPath::AdCopies);
        def.inputs = vec![InputBinding::artifact("Keywords", ArtifactPath::SelectedKeywordDetails)];
        let ctx = StageContext {
            workspace: &ws,
            backends: &backends,
            tools: &ContextTools::none(),
            vars: &PromptVars::new(),
            prior: &BTreeMap::new(),
        };

        let err = ContentGenerationStage::new(def).run(&ctx).await.unwrap_err();
        assert!(matches!(err, ContentCrewError::NotFound { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn backend_failure_is_generation_error_and_writes_nothing() {
        let (root, store) = temp_store();
        let ws = store.ensure_workspace(&UserId::parse("u1").unwrap()).unwrap();
        let backends = Backends::new().with(BackendKind::Anthropic, Arc::new(FailingBackend));
        let ctx = StageContext {
            workspace: &ws,
            backends: &backends,
            tools: &ContextTools::none(),
            vars: &PromptVars::new(),
            prior: &BTreeMap::new(),
        };

        let err = ContentGenerationStage::new(definition(ArtifactPath::Analysis))
            .run(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentCrewError::Generation(_)), "{err:?}");
        assert!(!ws.exists(ArtifactPath::Analysis));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn empty_response_is_an_error_naming_finish_reason() {
        let (root, store) = temp_store();
        let ws = store.ensure_workspace(&UserId::parse("u1").unwrap()).unwrap();
        let backends = Backends::new().with(
            BackendKind::Anthropic,
            Arc::new(ScriptedBackend::new(["  "]).with_finish_reason("max_tokens")),
        );
        let ctx = StageContext {
            workspace: &ws,
            backends: &backends,
            tools: &ContextTools::none(),
            vars: &PromptVars::new(),
            prior: &BTreeMap::new(),
        };

        let err = ContentGenerationStage::new(definition(ArtifactPath::Analysis))
            .run(&ctx)
            .await
            .unwrap_err();
        match err {
            ContentCrewError::Generation(msg) => assert!(msg.contains("max_tokens"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!ws.exists(ArtifactPath::Analysis));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn grounding_step_seeds_history_and_writes_logs() {
        let (root, store) = temp_store();
        let ws = store.ensure_workspace(&UserId::parse("u1").unwrap()).unwrap();
        let backend = Arc::new(ScriptedBackend::new(["research notes", "# Post"]));
        let backends = Backends::new().with(BackendKind::Gemini, backend.clone());

        let mut def = definition(ArtifactPath::BlogPost);
        def.backend = BackendKind::Gemini;
        def.system = None;
        def.template = "Write from {outline}".into();
        def.grounding = Some(GroundingStep {
            template: "Research {outline}".into(),
            temperature: Some(0.3),
            log: ArtifactPath::SearchLogs,
        });
        def.transcript = Some(ArtifactPath::BlogLogs);

        let vars = PromptVars::new().with("outline", "the outline");
        let ctx = StageContext {
            workspace: &ws,
            backends: &backends,
            tools: &ContextTools::none(),
            vars: &vars,
            prior: &BTreeMap::new(),
        };
        ContentGenerationStage::new(def).run(&ctx).await.unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].web_search);
        assert_eq!(requests[0].temperature, Some(0.3));
        assert!(!requests[1].web_search);
        let texts: Vec<_> = requests[1].messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["Research the outline", "research notes", "Write from the outline"]);

        assert_eq!(ws.read_artifact(ArtifactPath::SearchLogs).unwrap(), "research notes");
        assert_eq!(ws.read_artifact(ArtifactPath::BlogLogs).unwrap(), "# Post");
        assert_eq!(ws.read_artifact(ArtifactPath::BlogPost).unwrap(), "# Post");
        let _ = std::fs::remove_dir_all(&root);
    }
}
