//! Content quality orchestration for ContentCurator.
//!
//! This crate ties together the content store, the AI provider, scoring,
//! improvement and reporting into end-to-end document workflows
//! (e.g., [`ContentPipeline::improve_document`]).

pub mod analytics;
pub mod classify;
pub mod improvement;
pub mod integrity;
pub mod pipeline;
pub mod pricing;
pub mod provider;
pub mod scanner;
pub mod scoring;
pub mod status;

#[cfg(test)]
mod testing;

pub use analytics::{CostSummary, RoiAnalysis, cost_summary, roi_analysis};
pub use classify::{CLASSIFIER_VERSION, classify_provider_error};
pub use improvement::{ImprovementOutcome, Improver};
pub use pipeline::{
    BatchFailure, BatchReport, ContentPipeline, DiscoveryReport, ImprovementReport,
    ProgressReporter, ReviewReport, SilentProgress,
};
pub use provider::{AiProvider, CommandProvider, PromptOptions, ProviderResponse};
pub use scanner::ContentScanner;
pub use scoring::{DimensionAnalysis, Scorer, ScoringResult, ScoringStrategy};
pub use status::determine_status;
