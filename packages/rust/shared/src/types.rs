//! Core domain types for the content database.
//!
//! Everything in here is persisted in the store file, so field names are
//! serialized camelCase to keep the on-disk format stable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest possible dimension score.
pub const MIN_SCORE: f64 = 0.0;

/// Highest possible dimension score.
pub const MAX_SCORE: f64 = 10.0;

// ---------------------------------------------------------------------------
// Quality dimensions
// ---------------------------------------------------------------------------

/// One of the five independent quality axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Readability,
    Seo,
    TechnicalAccuracy,
    Engagement,
    ContentDepth,
}

impl Dimension {
    /// All dimensions, in scoring order.
    pub const ALL: [Dimension; 5] = [
        Dimension::Readability,
        Dimension::Seo,
        Dimension::TechnicalAccuracy,
        Dimension::Engagement,
        Dimension::ContentDepth,
    ];

    /// Stable key used in config files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readability => "readability",
            Self::Seo => "seo",
            Self::TechnicalAccuracy => "technical_accuracy",
            Self::Engagement => "engagement",
            Self::ContentDepth => "content_depth",
        }
    }

    /// Human-readable name used in prompts and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Readability => "Readability",
            Self::Seo => "SEO",
            Self::TechnicalAccuracy => "Technical Accuracy",
            Self::Engagement => "Engagement",
            Self::ContentDepth => "Content Depth",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown quality dimension '{s}'"))
    }
}

/// Scores for the five quality dimensions, each in `[0, 10]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityDimensions {
    pub readability: f64,
    pub seo: f64,
    pub technical_accuracy: f64,
    pub engagement: f64,
    pub content_depth: f64,
}

impl QualityDimensions {
    /// The same score on every dimension.
    pub fn uniform(score: f64) -> Self {
        Self {
            readability: score,
            seo: score,
            technical_accuracy: score,
            engagement: score,
            content_depth: score,
        }
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Readability => self.readability,
            Dimension::Seo => self.seo,
            Dimension::TechnicalAccuracy => self.technical_accuracy,
            Dimension::Engagement => self.engagement,
            Dimension::ContentDepth => self.content_depth,
        }
    }

    /// Set one dimension, clamping into the valid score range.
    pub fn set(&mut self, dimension: Dimension, score: f64) {
        let score = score.clamp(MIN_SCORE, MAX_SCORE);
        match dimension {
            Dimension::Readability => self.readability = score,
            Dimension::Seo => self.seo = score,
            Dimension::TechnicalAccuracy => self.technical_accuracy = score,
            Dimension::Engagement => self.engagement = score,
            Dimension::ContentDepth => self.content_depth = score,
        }
    }

    /// Mean of the five dimension scores.
    pub fn average(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.get(*d)).sum::<f64>() / Dimension::ALL.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Derived lifecycle state of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    NeedsReview,
    NeedsImprovement,
    MeetsTargets,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsReview => "needs_review",
            Self::NeedsImprovement => "needs_improvement",
            Self::MeetsTargets => "meets_targets",
        }
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Costs
// ---------------------------------------------------------------------------

/// Which cost bucket an AI operation is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Review,
    Improvement,
    Generation,
}

/// Cost record for a single AI request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationCostInfo {
    pub operation: OperationKind,
    /// USD.
    pub cost: f64,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate cost of one or more operations, attached to a history entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostInfo {
    pub total_cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<OperationCostInfo>,
}

impl CostInfo {
    /// Sum a set of operations.
    pub fn from_operations(operations: Vec<OperationCostInfo>) -> Self {
        let mut info = Self::default();
        for op in operations {
            info.push(op);
        }
        info
    }

    /// Add one operation to the aggregate.
    pub fn push(&mut self, op: OperationCostInfo) {
        self.total_cost += op.cost;
        self.input_tokens += op.input_tokens;
        self.output_tokens += op.output_tokens;
        self.operations.push(op);
    }

    /// Merge another aggregate into this one.
    pub fn extend(&mut self, other: CostInfo) {
        for op in other.operations {
            self.push(op);
        }
    }
}

/// Running cost totals for a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAccounting {
    pub review_costs: f64,
    pub improvement_costs: f64,
    pub generation_costs: f64,
    /// Always `review_costs + improvement_costs + generation_costs`.
    pub total_cost: f64,
    #[serde(default)]
    pub operation_history: Vec<OperationCostInfo>,
}

impl CostAccounting {
    /// Record an operation in its category and refresh the total.
    pub fn add_operation_cost(&mut self, info: OperationCostInfo) {
        match info.operation {
            OperationKind::Review => self.review_costs += info.cost,
            OperationKind::Improvement => self.improvement_costs += info.cost,
            OperationKind::Generation => self.generation_costs += info.cost,
        }
        self.total_cost = self.review_costs + self.improvement_costs + self.generation_costs;
        self.operation_history.push(info);
    }

    /// Record every operation of an aggregate.
    pub fn add_cost_info(&mut self, info: &CostInfo) {
        for op in &info.operations {
            self.add_operation_cost(op.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Before/after quality figures for one improvement iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityImprovementMetrics {
    pub score_before: f64,
    pub score_after: f64,
    pub quality_delta: f64,
    /// `cost / quality_delta`, or 0 when the delta is not positive.
    pub cost_per_quality_point: f64,
    pub iteration_number: u32,
}

impl QualityImprovementMetrics {
    pub fn new(score_before: f64, score_after: f64, cost: f64, iteration_number: u32) -> Self {
        let quality_delta = score_after - score_before;
        let cost_per_quality_point = if quality_delta > 0.0 {
            cost / quality_delta
        } else {
            0.0
        };
        Self {
            score_before,
            score_after,
            quality_delta,
            cost_per_quality_point,
            iteration_number,
        }
    }
}

/// One scoring or improvement event. History is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewHistoryEntry {
    pub date: DateTime<Utc>,
    pub scores: QualityDimensions,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_info: Option<CostInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement_metrics: Option<QualityImprovementMetrics>,
}

// ---------------------------------------------------------------------------
// Entries & database
// ---------------------------------------------------------------------------

/// Persistent state of a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    pub current_scores: QualityDimensions,
    pub target_scores: QualityDimensions,
    pub status: ContentStatus,
    pub improvement_iterations: u32,
    #[serde(default)]
    pub review_history: Vec<ReviewHistoryEntry>,
    #[serde(default)]
    pub cost_accounting: CostAccounting,
}

impl ContentEntry {
    /// A freshly discovered document: zero scores, awaiting review.
    pub fn new(target_scores: QualityDimensions) -> Self {
        Self {
            current_scores: QualityDimensions::default(),
            target_scores,
            status: ContentStatus::NeedsReview,
            improvement_iterations: 0,
            review_history: Vec::new(),
            cost_accounting: CostAccounting::default(),
        }
    }

    /// Whether the document has been scored at least once.
    pub fn is_reviewed(&self) -> bool {
        !self.review_history.is_empty()
    }
}

/// The single persisted aggregate. Keys of `entries` are canonical paths in
/// memory and store-relative paths on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDatabase {
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub entries: BTreeMap<String, ContentEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl Default for ContentDatabase {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            entries: BTreeMap::new(),
            config: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Model descriptors
// ---------------------------------------------------------------------------

/// A provider/model pair, one element of a fallback list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelOption {
    pub provider: String,
    pub model: String,
}

impl ModelOption {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Key into the pricing table.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl std::fmt::Display for ModelOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}
