//! Application configuration for ContentCurator.
//!
//! Config is looked up at `./contentcurator.toml`, then
//! `~/.contentcurator/contentcurator.toml`. CLI flags override config file
//! values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CurationError, Result};
use crate::types::{Dimension, ModelOption, QualityDimensions};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentcurator.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentcurator";

// ---------------------------------------------------------------------------
// Config structs (matching contentcurator.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which files are managed and where the database lives.
    #[serde(default)]
    pub content: ContentConfig,

    /// AI subprocess settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Per-dimension scoring models.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Improvement fallback models and integrity thresholds.
    #[serde(default)]
    pub improvement: ImprovementConfig,

    /// Large-document chunking.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Batch grouping and rate-limit pause.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Target score per dimension for new entries.
    #[serde(default = "default_targets")]
    pub targets: QualityDimensions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            content: ContentConfig::default(),
            provider: ProviderConfig::default(),
            scoring: ScoringConfig::default(),
            improvement: ImprovementConfig::default(),
            chunking: ChunkingConfig::default(),
            batch: BatchConfig::default(),
            targets: default_targets(),
        }
    }
}

fn default_targets() -> QualityDimensions {
    QualityDimensions::uniform(8.5)
}

/// `[content]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Directory scanned for documents.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Glob patterns (relative to `base_dir`) of files to manage.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Glob patterns excluded even when included.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Path of the JSON content database.
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            include: default_include(),
            exclude: default_exclude(),
            database: default_database(),
        }
    }
}

fn default_base_dir() -> String {
    ".".into()
}
fn default_include() -> Vec<String> {
    vec!["**/*.md".into(), "**/*.mdx".into()]
}
fn default_exclude() -> Vec<String> {
    vec!["**/node_modules/**".into(), "**/.git/**".into()]
}
fn default_database() -> String {
    "content-database.json".into()
}

/// `[provider]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name recorded in cost entries when a model option has none.
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Executable that answers prompts (prompt on stdin, answer on stdout).
    #[serde(default = "default_command")]
    pub command: String,

    /// Fixed arguments passed before the model flag.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Flag used to select the model, e.g. `--model`.
    #[serde(default = "default_model_flag")]
    pub model_flag: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            command: default_command(),
            args: default_args(),
            model_flag: default_model_flag(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider_name() -> String {
    "anthropic".into()
}
fn default_command() -> String {
    "claude".into()
}
fn default_args() -> Vec<String> {
    vec!["-p".into(), "--output-format".into(), "json".into()]
}
fn default_model_flag() -> String {
    "--model".into()
}
fn default_timeout_secs() -> u64 {
    600
}

/// `[scoring]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Model used for any dimension without an override.
    #[serde(default = "default_scoring_model")]
    pub default_model: ModelOption,

    /// Per-dimension overrides keyed by dimension (`readability`, `seo`, ...).
    #[serde(default)]
    pub dimensions: BTreeMap<String, ModelOption>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_model: default_scoring_model(),
            dimensions: BTreeMap::new(),
        }
    }
}

impl ScoringConfig {
    /// Preferred model for a dimension.
    pub fn model_for(&self, dimension: Dimension) -> ModelOption {
        self.dimensions
            .get(dimension.as_str())
            .cloned()
            .unwrap_or_else(|| self.default_model.clone())
    }
}

fn default_scoring_model() -> ModelOption {
    ModelOption::new("anthropic", "claude-sonnet-4")
}

/// `[improvement]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementConfig {
    /// Ordered fallback list; the first model is tried first.
    #[serde(default = "default_improvement_models")]
    pub models: Vec<ModelOption>,

    /// Length-ratio limits applied to improved content.
    #[serde(default)]
    pub thresholds: IntegrityThresholds,
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            models: default_improvement_models(),
            thresholds: IntegrityThresholds::default(),
        }
    }
}

fn default_improvement_models() -> Vec<ModelOption> {
    vec![
        ModelOption::new("anthropic", "claude-opus-4"),
        ModelOption::new("anthropic", "claude-sonnet-4"),
    ]
}

/// Length-ratio limits (`final / original`) for improved content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrityThresholds {
    /// Below this the result is rejected.
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,
    /// Below this (but above `min_ratio`) the result is accepted with a warning.
    #[serde(default = "default_warn_ratio")]
    pub warn_ratio: f64,
    /// Above this the result is accepted with an informational note.
    #[serde(default = "default_max_ratio")]
    pub max_ratio: f64,
}

impl Default for IntegrityThresholds {
    fn default() -> Self {
        Self {
            min_ratio: default_min_ratio(),
            warn_ratio: default_warn_ratio(),
            max_ratio: default_max_ratio(),
        }
    }
}

fn default_min_ratio() -> f64 {
    0.70
}
fn default_warn_ratio() -> f64 {
    0.85
}
fn default_max_ratio() -> f64 {
    1.20
}

/// `[chunking]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Documents longer than this (in characters) are chunked.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// A chunk is never split before it reaches this size.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Lines repeated at the start of each chunk from the previous one.
    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,

    /// Header levels that may start a new chunk.
    #[serde(default = "default_split_levels")]
    pub split_levels: Vec<u8>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            min_chunk_size: default_min_chunk_size(),
            overlap_lines: default_overlap_lines(),
            split_levels: default_split_levels(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    20_000
}
fn default_min_chunk_size() -> usize {
    5_000
}
fn default_overlap_lines() -> usize {
    2
}
fn default_split_levels() -> Vec<u8> {
    vec![1, 2, 3]
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Documents processed concurrently per group.
    #[serde(default = "default_batch_size")]
    pub size: usize,

    /// Pause between groups, in milliseconds.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            pause_ms: default_pause_ms(),
        }
    }
}

fn default_batch_size() -> usize {
    3
}
fn default_pause_ms() -> u64 {
    2_000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentcurator/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CurationError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.contentcurator/contentcurator.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config. A `contentcurator.toml` in the working
/// directory wins over the user config; defaults are used when neither exists.
pub fn load_config() -> Result<AppConfig> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return load_config_from(&local);
    }

    let path = config_file_path()?;
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CurationError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        CurationError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Write a default config file. With no explicit path, it goes to the user
/// config directory. Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| CurationError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CurationError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CurationError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configurations the pipeline cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.improvement.models.is_empty() {
        return Err(CurationError::config(
            "improvement.models must list at least one model",
        ));
    }
    if config.provider.command.trim().is_empty() {
        return Err(CurationError::config("provider.command must not be empty"));
    }
    let chunking = &config.chunking;
    if chunking.min_chunk_size >= chunking.max_chunk_size {
        return Err(CurationError::config(format!(
            "chunking.min_chunk_size ({}) must be below chunking.max_chunk_size ({})",
            chunking.min_chunk_size, chunking.max_chunk_size
        )));
    }
    if let Some(level) = chunking.split_levels.iter().find(|l| !(1..=6).contains(*l)) {
        return Err(CurationError::config(format!(
            "chunking.split_levels contains invalid header level {level}"
        )));
    }
    let t = &config.improvement.thresholds;
    if !(0.0 < t.min_ratio && t.min_ratio <= t.warn_ratio && t.warn_ratio <= t.max_ratio) {
        return Err(CurationError::config(
            "improvement.thresholds must satisfy 0 < min_ratio <= warn_ratio <= max_ratio",
        ));
    }
    if config.batch.size == 0 {
        return Err(CurationError::config("batch.size must be at least 1"));
    }
    for key in config.scoring.dimensions.keys() {
        key.parse::<Dimension>().map_err(CurationError::config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_dir"));
        assert!(toml_str.contains("claude-opus-4"));
    }

    #[test]
    fn default_targets_are_meets_targets_threshold() {
        assert_eq!(AppConfig::default().targets, QualityDimensions::uniform(8.5));
        let parsed: AppConfig = toml::from_str("").expect("parse empty");
        assert_eq!(parsed.targets, QualityDimensions::uniform(8.5));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.chunking, ChunkingConfig::default());
        assert_eq!(parsed.improvement.models.len(), 2);
        assert_eq!(parsed.targets, QualityDimensions::uniform(8.5));
        validate_config(&parsed).expect("defaults are valid");
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = r#"
[content]
base_dir = "docs"

[scoring.dimensions]
seo = { provider = "openai", model = "gpt-4o-mini" }

[[improvement.models]]
provider = "anthropic"
model = "claude-sonnet-4"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.content.base_dir, "docs");
        assert_eq!(config.content.database, "content-database.json");
        assert_eq!(config.improvement.models.len(), 1);
        assert_eq!(config.batch.size, 3);
        assert_eq!(
            config.scoring.model_for(Dimension::Seo),
            ModelOption::new("openai", "gpt-4o-mini")
        );
        assert_eq!(
            config.scoring.model_for(Dimension::Readability),
            ModelOption::new("anthropic", "claude-sonnet-4")
        );
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.improvement.models.clear();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.chunking.min_chunk_size = 30_000;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.chunking.split_levels = vec![2, 7];
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config
            .scoring
            .dimensions
            .insert("clarity".into(), ModelOption::new("a", "b"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("clarity"));
    }

    #[test]
    fn init_config_writes_file() {
        let path = std::env::temp_dir()
            .join(format!("cc_config_{}", std::process::id()))
            .join(CONFIG_FILE_NAME);
        let written = init_config(Some(&path)).expect("init config");
        let loaded = load_config_from(&written).expect("load written config");
        assert_eq!(loaded.provider.command, "claude");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
