//! Shared types, error model, and configuration for ContentCrew.
//!
//! This crate is the foundation depended on by all other ContentCrew crates.
//! It provides:
//! - [`ContentCrewError`], the unified error type
//! - Domain types ([`UserId`], [`KeywordRecord`], [`RankingsResult`], [`CompetitorList`])
//! - Configuration ([`AppConfig`], config loading, credential lookup)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackendConfig, BackendsConfig, BusinessConfig, DefaultsConfig,
    KeywordResearchConfig, PromptsConfig, SearchConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, read_env_credential,
};
pub use error::{ContentCrewError, Result};
pub use types::{
    Competitor, CompetitorList, CompetitorRankingsMap, KeywordRecord, RankingsResult,
    SelectedKeywordDetails, UserId,
};
