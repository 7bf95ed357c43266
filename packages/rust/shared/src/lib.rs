//! Shared types, error model, and configuration for ContentCurator.
//!
//! This crate is the foundation depended on by all other ContentCurator crates.
//! It provides:
//! - [`CurationError`], the unified error type
//! - Domain types ([`ContentEntry`], [`QualityDimensions`], [`CostAccounting`], ...)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchConfig, ChunkingConfig, ContentConfig, ImprovementConfig,
    IntegrityThresholds, ProviderConfig, ScoringConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_config,
};
pub use error::{CurationError, IntegrityError, ProviderError, ProviderErrorKind, Result};
pub use types::{
    ContentDatabase, ContentEntry, ContentStatus, CostAccounting, CostInfo, Dimension,
    MAX_SCORE, MIN_SCORE, ModelOption, OperationCostInfo, OperationKind,
    QualityDimensions, QualityImprovementMetrics, ReviewHistoryEntry,
};
