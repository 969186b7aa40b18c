//! The stage catalog: which backend, inputs and output each stage uses.

use contentcrew_generation::BackendKind;
use contentcrew_shared::AppConfig;
use contentcrew_storage::ArtifactPath;

use crate::prompts;
use crate::stage::{GroundingStep, InputBinding, StageDefinition};

pub const KEYWORD_ANALYSIS: &str = "keyword_analysis";
pub const AD_COPY: &str = "ad_copy";
pub const BLOG_OUTLINE: &str = "blog_outline";
pub const BLOG_POST: &str = "blog_post";
pub const CREW_BLOG_POST: &str = "crew_blog_post";

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

fn template(custom: &Option<String>, builtin: &str) -> String {
    custom.clone().unwrap_or_else(|| builtin.to_string())
}

fn reference_pages(config: &AppConfig) -> impl Iterator<Item = InputBinding> + '_ {
    config
        .business
        .reference_urls
        .iter()
        .map(|url| InputBinding::Website { url: url.clone() })
}

/// Competitor vs. user keyword analysis.
pub fn keyword_analysis(config: &AppConfig) -> StageDefinition {
    StageDefinition {
        name: KEYWORD_ANALYSIS.into(),
        backend: BackendKind::Anthropic,
        system: Some(prompts::ANALYST_SYSTEM.into()),
        template: template(&config.prompts.keyword_analysis, prompts::KEYWORD_ANALYSIS),
        inputs: vec![
            InputBinding::artifact("Competitor rankings", ArtifactPath::CompetitorRankings),
            InputBinding::artifact("User rankings", ArtifactPath::UserRankings),
        ],
        grounding: None,
        transcript: None,
        output: ArtifactPath::Analysis,
        temperature: None,
        max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
    }
}

/// Search ad copy for the selected keywords.
pub fn ad_copy(config: &AppConfig) -> StageDefinition {
    StageDefinition {
        name: AD_COPY.into(),
        backend: BackendKind::Anthropic,
        system: Some(prompts::COPYWRITER_SYSTEM.into()),
        template: template(&config.prompts.ad_copy, prompts::AD_COPY),
        inputs: vec![InputBinding::artifact(
            "Selected keyword details",
            ArtifactPath::SelectedKeywordDetails,
        )],
        grounding: None,
        transcript: None,
        output: ArtifactPath::AdCopies,
        temperature: None,
        max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
    }
}

/// Blog outlines built on the ad copy. The ad copy arrives both in memory and
/// from its persisted file.
pub fn blog_outline(config: &AppConfig) -> StageDefinition {
    let mut inputs = vec![
        InputBinding::prior(AD_COPY),
        InputBinding::artifact("Ad copies", ArtifactPath::AdCopies),
        InputBinding::artifact("Selected keyword details", ArtifactPath::SelectedKeywordDetails),
    ];
    inputs.extend(reference_pages(config));
    inputs.push(InputBinding::WebSearch {
        query: prompts::OUTLINE_SEARCH_QUERY.into(),
    });

    StageDefinition {
        name: BLOG_OUTLINE.into(),
        backend: BackendKind::Anthropic,
        system: Some(prompts::STRATEGIST_SYSTEM.into()),
        template: template(&config.prompts.blog_outline, prompts::BLOG_OUTLINE),
        inputs,
        grounding: None,
        transcript: None,
        output: ArtifactPath::BlogPostOutlines,
        temperature: None,
        max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
    }
}

/// Standalone blog post: a search-grounded research call, then the writing
/// call seeded with the research.
pub fn blog_post(config: &AppConfig) -> StageDefinition {
    StageDefinition {
        name: BLOG_POST.into(),
        backend: BackendKind::Gemini,
        system: None,
        template: template(&config.prompts.blog_post, prompts::BLOG_POST),
        inputs: vec![],
        grounding: Some(GroundingStep {
            template: template(&config.prompts.blog_search, prompts::BLOG_SEARCH),
            temperature: Some(0.3),
            log: ArtifactPath::SearchLogs,
        }),
        transcript: Some(ArtifactPath::BlogLogs),
        output: ArtifactPath::BlogPost,
        temperature: Some(0.3),
        max_output_tokens: 4000,
    }
}

/// Blog post written from an outline with reference pages and web search as
/// context.
pub fn crew_blog_post(config: &AppConfig) -> StageDefinition {
    let mut inputs: Vec<_> = reference_pages(config).collect();
    inputs.push(InputBinding::WebSearch {
        query: prompts::TOPIC_SEARCH_QUERY.into(),
    });

    StageDefinition {
        name: CREW_BLOG_POST.into(),
        backend: BackendKind::OpenRouter,
        system: Some(prompts::WRITER_SYSTEM.into()),
        template: template(&config.prompts.crew_blog_post, prompts::CREW_BLOG_POST),
        inputs,
        grounding: None,
        transcript: None,
        output: ArtifactPath::CrewBlogPost,
        temperature: None,
        max_output_tokens: 8192,
    }
}
