//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use contentcrew_core::pipeline::{Pipeline, ProgressReporter};
use contentcrew_core::selection;
use contentcrew_core::stage::StageOutput;
use contentcrew_shared::{AppConfig, UserId, init_config, load_config, load_config_from};
use contentcrew_storage::{ArtifactPath, OutputStore};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ContentCrew: keyword research and SEO content generation for schools.
#[derive(Parser, Debug)]
#[command(
    name = "contentcrew",
    version,
    about = "Research competitor keywords and generate ad copy, blog outlines and blog posts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.contentcrew/contentcrew.toml).
    #[arg(long, env = "CONTENTCREW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Root directory for per-user outputs (overrides the config file).
    #[arg(long, env = "CONTENTCREW_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// School identity shared by `analyze` and `seo`.
#[derive(Args, Debug)]
pub(crate) struct SchoolArgs {
    /// School or business name used in prompts.
    #[arg(long)]
    pub school_name: String,

    /// The school's website domain, e.g. https://www.school.example
    #[arg(long)]
    pub domain: String,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Fetch keyword rankings for a domain and its competitors, then analyze them.
    Analyze {
        /// Workspace to write into (a new id is generated when omitted).
        #[arg(long)]
        user_id: Option<UserId>,

        #[command(flatten)]
        school: SchoolArgs,
    },

    /// Inspect and select competitor keywords.
    Keywords {
        #[command(subcommand)]
        action: KeywordsAction,
    },

    /// Generate ad copy and blog outlines for the selected keywords.
    Seo {
        #[arg(long)]
        user_id: UserId,

        #[command(flatten)]
        school: SchoolArgs,
    },

    /// Write a blog post from an outline.
    Blog {
        #[arg(long)]
        user_id: UserId,

        /// Outline text.
        #[arg(long, conflicts_with = "outline_file", required_unless_present = "outline_file")]
        outline: Option<String>,

        /// Read the outline from a file.
        #[arg(long)]
        outline_file: Option<PathBuf>,

        /// Use the reference-page and web-search writer instead of the
        /// search-grounded one.
        #[arg(long)]
        crew: bool,
    },

    /// Print an artifact from a user's workspace.
    Show {
        #[arg(long)]
        user_id: UserId,

        /// Artifact name (e.g. `blog_post.md`) or any path relative to the
        /// workspace (`crew/1_analysis.md`, `notes/brief.md`).
        file: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Keyword subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum KeywordsAction {
    /// List unique keywords per competitor domain, numbered for `--pick`.
    List {
        #[arg(long)]
        user_id: UserId,
    },
    /// Save details of the chosen keywords for the SEO stages.
    Select {
        #[arg(long)]
        user_id: UserId,

        /// Keyword to select (repeatable).
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        /// Keyword by position as shown by `keywords list`, e.g. `1.2`
        /// (repeatable, comma-separated).
        #[arg(long = "pick")]
        picks: Vec<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "contentcrew=info",
        1 => "contentcrew=debug",
        _ => "contentcrew=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    match cli.command {
        Command::Analyze { user_id, school } => cmd_analyze(config, user_id, &school).await,
        Command::Keywords { action } => match action {
            KeywordsAction::List { user_id } => cmd_keywords_list(config, &user_id),
            KeywordsAction::Select {
                user_id,
                keywords,
                picks,
            } => cmd_keywords_select(config, &user_id, keywords, &picks),
        },
        Command::Seo { user_id, school } => cmd_seo(config, &user_id, &school).await,
        Command::Blog {
            user_id,
            outline,
            outline_file,
            crew,
        } => {
            let outline = read_outline(outline, outline_file.as_deref())?;
            cmd_blog(config, &user_id, &outline, crew).await
        }
        Command::Show { user_id, file } => cmd_show(&config, &user_id, &file),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

/// Load the config file and apply flag overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)
            .wrap_err_with(|| format!("failed to load config from {}", path.display()))?,
        None => load_config()?,
    };
    if let Some(dir) = &cli.output_dir {
        config.defaults.output_dir = dir.to_string_lossy().to_string();
    }
    Ok(config)
}

fn read_outline(outline: Option<String>, file: Option<&Path>) -> Result<String> {
    let text = match (outline, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read outline from {}", path.display()))?,
        (None, None) => return Err(eyre!("an outline is required (--outline or --outline-file)")),
    };
    if text.trim().is_empty() {
        return Err(eyre!("the outline is empty"));
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_analyze(
    config: AppConfig,
    user_id: Option<UserId>,
    school: &SchoolArgs,
) -> Result<()> {
    let user_id = user_id.unwrap_or_else(UserId::generate);
    info!(%user_id, domain = %school.domain, "running analysis");

    let pipeline = Pipeline::from_config(config)?;
    let reporter = CliProgress::new();
    let report = pipeline
        .run_analysis(&user_id, &school.school_name, &school.domain, &reporter)
        .await?;
    reporter.finish();

    println!();
    println!("  Analysis complete!");
    println!("  User ID:     {user_id}");
    println!("  Competitors: {}", report.competitors.join(", "));
    println!("  Keywords:    {} for {}", report.user_keyword_count, school.domain);
    print_stage(&report.analysis);
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());
    println!();
    println!("  Next: contentcrew keywords list --user-id {user_id}");
    println!();

    Ok(())
}

fn cmd_keywords_list(config: AppConfig, user_id: &UserId) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let available = pipeline.available_keywords(user_id)?;

    for (i, (domain, keywords)) in available.iter().enumerate() {
        println!("{}. {domain}:", i + 1);
        for (j, keyword) in keywords.iter().enumerate() {
            println!("   {}.{} {keyword}", i + 1, j + 1);
        }
    }
    Ok(())
}

fn cmd_keywords_select(
    config: AppConfig,
    user_id: &UserId,
    mut keywords: Vec<String>,
    picks: &[String],
) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;

    if !picks.is_empty() {
        let available = pipeline.available_keywords(user_id)?;
        for keyword in selection::resolve_picks(&available, picks)? {
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
    }
    if keywords.is_empty() {
        return Err(eyre!("select at least one keyword with --keyword or --pick"));
    }

    let report = pipeline.save_keyword_details(user_id, &keywords)?;

    println!("Selected: {}", report.selected.join(", "));
    if !report.unmatched.is_empty() {
        println!("Not found: {}", report.unmatched.join(", "));
    }
    println!("Saved to: {}", report.path.display());
    Ok(())
}

async fn cmd_seo(config: AppConfig, user_id: &UserId, school: &SchoolArgs) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let reporter = CliProgress::new();
    let report = pipeline
        .run_seo(user_id, &school.school_name, &school.domain, &reporter)
        .await?;
    reporter.finish();

    println!();
    println!("  SEO content generated!");
    print_stage(&report.ad_copies);
    print_stage(&report.outlines);
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());
    println!();
    Ok(())
}

async fn cmd_blog(config: AppConfig, user_id: &UserId, outline: &str, crew: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let reporter = CliProgress::new();
    let report = if crew {
        pipeline.run_crew_blog(user_id, outline, &reporter).await?
    } else {
        pipeline.run_blog(user_id, outline, &reporter).await?
    };
    reporter.finish();

    println!();
    println!("  Blog post written!");
    print_stage(&report.post);
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());
    println!();
    Ok(())
}

fn cmd_show(config: &AppConfig, user_id: &UserId, file: &str) -> Result<()> {
    let workspace = OutputStore::new(&config.defaults.output_dir).open_workspace(user_id)?;

    let content = match ArtifactPath::from_file_name(file) {
        Some(artifact) => workspace.read_artifact(artifact)?,
        // Anything else the user keeps in the workspace, by relative path.
        None => workspace.read_relative(file).wrap_err_with(|| {
            let known: Vec<_> = ArtifactPath::ALL.iter().map(|a| a.file_name()).collect();
            format!("'{file}' is not in the workspace (artifacts: {})", known.join(", "))
        })?,
    };
    print!("{content}");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_stage(output: &StageOutput) {
    println!(
        "  {:<12} {} ({}, {} in / {} out tokens)",
        format!("{}:", output.stage),
        output.path.display(),
        output.model,
        output.tokens_in,
        output.tokens_out
    );
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn competitor_fetched(&self, domain: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetched rankings [{current}/{total}] {domain}"));
    }

    fn stage_done(&self, output: &StageOutput) {
        self.spinner
            .println(format!("  ✓ {} → {}", output.stage, output.artifact));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_select_with_picks_and_keywords() {
        let cli = Cli::try_parse_from([
            "contentcrew",
            "keywords",
            "select",
            "--user-id",
            "u1",
            "--keyword",
            "school admission",
            "--pick",
            "1.2,2.1",
        ])
        .unwrap();
        match cli.command {
            Command::Keywords {
                action: KeywordsAction::Select { user_id, keywords, picks },
            } => {
                assert_eq!(user_id.as_str(), "u1");
                assert_eq!(keywords, ["school admission"]);
                assert_eq!(picks, ["1.2,2.1"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_path_like_user_id() {
        let parsed =
            Cli::try_parse_from(["contentcrew", "show", "--user-id", "../x", "blog_post.md"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn blog_requires_an_outline() {
        assert!(Cli::try_parse_from(["contentcrew", "blog", "--user-id", "u1"]).is_err());
        assert!(
            Cli::try_parse_from([
                "contentcrew",
                "blog",
                "--user-id",
                "u1",
                "--outline",
                "x",
                "--crew",
            ])
            .is_ok()
        );
    }

    #[test]
    fn outline_file_is_read() {
        let path = std::env::temp_dir().join(format!("cc-outline-{}.md", uuid::Uuid::now_v7()));
        std::fs::write(&path, "# Outline\n- point").unwrap();
        assert_eq!(read_outline(None, Some(&path)).unwrap(), "# Outline\n- point");
        assert!(read_outline(Some("  ".into()), None).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn show_reads_artifacts_and_other_workspace_files() {
        let root = std::env::temp_dir().join(format!("cc-show-{}", uuid::Uuid::now_v7()));
        let mut config = AppConfig::default();
        config.defaults.output_dir = root.to_string_lossy().to_string();

        let user = UserId::parse("u1").unwrap();
        let workspace = OutputStore::new(&root).ensure_workspace(&user).unwrap();
        workspace.write_artifact(ArtifactPath::BlogPost, "post").unwrap();
        std::fs::write(workspace.root().join("crew").join("brief.md"), "brief").unwrap();

        assert!(cmd_show(&config, &user, "blog_post.md").is_ok());
        assert!(cmd_show(&config, &user, "crew/brief.md").is_ok());
        assert!(cmd_show(&config, &user, "crew/missing.md").is_err());
        assert!(cmd_show(&config, &user, "../u2/crew/brief.md").is_err());

        let _ = std::fs::remove_dir_all(&root);
    }
}
