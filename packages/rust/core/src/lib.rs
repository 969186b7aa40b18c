//! Content generation stages and the pipeline that chains them.
//!
//! A stage is one prompt plus pre-resolved context sent to one backend,
//! producing exactly one artifact in the user's workspace. The pipeline
//! fetches keyword data, runs stages in order and hands each stage's output to
//! the next.

pub mod pipeline;
pub mod prompts;
pub mod selection;
pub mod stage;
pub mod stages;

#[cfg(test)]
mod testing;

pub use pipeline::{
    AnalysisReport, BlogReport, Pipeline, ProgressReporter, SelectionReport, SeoReport,
    SilentProgress,
};
pub use selection::AvailableKeywords;
pub use stage::{ContentGenerationStage, StageDefinition, StageOutput};
