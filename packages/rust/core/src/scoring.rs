//! Multi-dimension scoring through the AI provider.
//!
//! One prompt per quality dimension, each sent to that dimension's preferred
//! model. Answers follow a small line grammar:
//!
//! ```text
//! SCORE: 7.5
//! REASONING: Clear structure, but the intro is long.
//! SUGGESTIONS:
//! - Shorten the introduction
//! - Add a summary table
//! ```
//!
//! The parser is deliberately forgiving. A malformed answer degrades to a
//! neutral score; only provider failures abort scoring.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, Span, debug, info_span, warn};

use contentcurator_shared::{
    CostInfo, Dimension, MAX_SCORE, MIN_SCORE, ModelOption, OperationKind, QualityDimensions,
    Result, ScoringConfig,
};

use crate::provider::{AiProvider, PromptOptions};

/// Score used when an answer carries no recognizable score.
pub const NEUTRAL_SCORE: f64 = 7.0;

const PLACEHOLDER_REASONING: &str = "The scoring response could not be parsed.";
const PLACEHOLDER_SUGGESTION: &str = "Review this dimension manually.";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which model scores a dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringStrategy {
    pub dimension: Dimension,
    pub model: ModelOption,
}

/// Parsed answer for one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionAnalysis {
    pub dimension: Dimension,
    pub score: f64,
    pub reasoning: String,
    pub suggestions: Vec<String>,
    pub model: ModelOption,
    /// Set when the answer was unstructured and the neutral score was used.
    pub degraded: bool,
}

/// Result of scoring one document on all dimensions.
#[derive(Debug, Clone)]
pub struct ScoringResult {
    pub scores: QualityDimensions,
    pub analysis: Vec<DimensionAnalysis>,
    pub total_cost: f64,
    pub cost_breakdown: CostInfo,
}

impl ScoringResult {
    /// All suggestions, prefixed with their dimension.
    pub fn suggestions(&self) -> Vec<String> {
        self.analysis
            .iter()
            .flat_map(|a| {
                a.suggestions
                    .iter()
                    .map(move |s| format!("{}: {s}", a.dimension.label()))
            })
            .collect()
    }

    pub fn degraded_dimensions(&self) -> Vec<Dimension> {
        self.analysis
            .iter()
            .filter(|a| a.degraded)
            .map(|a| a.dimension)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Scores documents on the five quality dimensions.
pub struct Scorer {
    provider: Arc<dyn AiProvider>,
    config: ScoringConfig,
    span: Span,
}

impl Scorer {
    pub fn new(provider: Arc<dyn AiProvider>, config: ScoringConfig, parent: &Span) -> Self {
        Self {
            provider,
            config,
            span: info_span!(parent: parent, "scorer"),
        }
    }

    /// Score `text` on every dimension, sequentially.
    ///
    /// `strategies` overrides the configured model per dimension; dimensions
    /// it does not mention use the config.
    pub async fn score_content(
        &self,
        text: &str,
        strategies: Option<&[ScoringStrategy]>,
    ) -> Result<ScoringResult> {
        let span = info_span!(parent: &self.span, "score_content", chars = text.len());
        self.score_all(text, strategies).instrument(span).await
    }

    async fn score_all(
        &self,
        text: &str,
        strategies: Option<&[ScoringStrategy]>,
    ) -> Result<ScoringResult> {
        let mut scores = QualityDimensions::default();
        let mut analysis = Vec::with_capacity(Dimension::ALL.len());
        let mut cost = CostInfo::default();

        for dimension in Dimension::ALL {
            let model = strategies
                .and_then(|s| s.iter().find(|s| s.dimension == dimension))
                .map(|s| s.model.clone())
                .unwrap_or_else(|| self.config.model_for(dimension));

            let prompt = build_scoring_prompt(dimension, text);
            let response = self
                .provider
                .prompt(&prompt, &PromptOptions::for_model(&model))
                .await?;
            cost.push(response.cost_info(OperationKind::Review, &model));

            let parsed = parse_score_response(&response.content);
            if parsed.degraded {
                warn!(
                    dimension = %dimension,
                    model = %model,
                    "unstructured scoring response, using neutral score"
                );
            }
            debug!(dimension = %dimension, score = parsed.score, "dimension scored");

            scores.set(dimension, parsed.score);
            analysis.push(DimensionAnalysis {
                dimension,
                score: scores.get(dimension),
                reasoning: parsed.reasoning,
                suggestions: parsed.suggestions,
                model,
                degraded: parsed.degraded,
            });
        }

        Ok(ScoringResult {
            scores,
            analysis,
            total_cost: cost.total_cost,
            cost_breakdown: cost,
        })
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn criteria(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Readability => {
            "sentence length and clarity, paragraph structure, use of headings and lists, \
             jargon explained for the intended audience"
        }
        Dimension::Seo => {
            "descriptive title and headings, keyword use without stuffing, meta description \
             in frontmatter, internal links, scannable structure"
        }
        Dimension::TechnicalAccuracy => {
            "correctness of facts, code samples and commands, current versions and APIs, \
             precise terminology"
        }
        Dimension::Engagement => {
            "strength of the opening, concrete examples, voice, calls to action, \
             motivation for the reader to continue"
        }
        Dimension::ContentDepth => {
            "coverage of the topic, edge cases and caveats, explanation of why as well as how, \
             useful references"
        }
    }
}

/// Prompt asking for a score on a single dimension.
pub fn build_scoring_prompt(dimension: Dimension, text: &str) -> String {
    format!(
        "You are reviewing a document for {label}.\n\
         Evaluate it on: {criteria}.\n\n\
         Respond in exactly this format and nothing else:\n\
         SCORE: <number from 0 to 10>\n\
         REASONING: <one or two sentences>\n\
         SUGGESTIONS:\n\
         - <specific improvement>\n\
         - <specific improvement>\n\n\
         Document:\n\
         <document>\n{text}\n</document>\n",
        label = dimension.label(),
        criteria = criteria(dimension),
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// A scoring answer, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub score: f64,
    pub reasoning: String,
    pub suggestions: Vec<String>,
    pub degraded: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Reasoning,
    Suggestions,
}

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:overall\s+)?score\s*[:=\-]?\s*(\d+(?:\.\d+)?)(?:\s*/\s*10)?\b")
        .expect("valid regex")
});
static REASONING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^reasoning\s*:\s*(.*)$").expect("valid regex"));
static SUGGESTIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^suggestions?\s*:\s*(.*)$").expect("valid regex"));
static BARE_SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(?:\s*/\s*10)?$").expect("valid regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s+(.+)$").expect("valid regex"));

/// Drop heading markers and emphasis so `**SCORE:** 8` reads as `SCORE: 8`.
fn normalize_line(line: &str) -> String {
    let line = line.trim().trim_start_matches('#').trim_start();
    line.replace("**", "").replace("__", "").trim().to_string()
}

/// Parse a scoring answer. Never fails: missing pieces fall back to
/// the neutral score and placeholders.
pub fn parse_score_response(text: &str) -> ParsedScore {
    let mut score: Option<f64> = None;
    let mut reasoning: Vec<String> = Vec::new();
    let mut suggestions: Vec<String> = Vec::new();
    let mut section = Section::None;

    for raw in text.lines() {
        if raw.trim().is_empty() {
            continue;
        }

        // Bullets are matched before normalization: `* item` is a list, not emphasis.
        if let Some(caps) = BULLET_RE.captures(raw.trim()) {
            let item = normalize_line(&caps[1]);
            if !item.is_empty() {
                suggestions.push(item);
            }
            continue;
        }

        let line = normalize_line(raw);

        if let Some(caps) = SCORE_RE.captures(&line) {
            if score.is_none() {
                score = caps[1].parse().ok();
            }
            section = Section::None;
        } else if let Some(caps) = REASONING_RE.captures(&line) {
            let first = caps[1].trim();
            if !first.is_empty() {
                reasoning.push(first.to_string());
            }
            section = Section::Reasoning;
        } else if let Some(caps) = SUGGESTIONS_RE.captures(&line) {
            let inline = caps[1].trim();
            if !inline.is_empty() {
                suggestions.push(inline.to_string());
            }
            section = Section::Suggestions;
        } else if let Some(caps) = BARE_SCORE_RE.captures(&line) {
            if score.is_none() {
                score = caps[1].parse().ok();
            }
        } else if section == Section::Reasoning {
            reasoning.push(line);
        }
    }

    let degraded = score.is_none();
    let score = score.unwrap_or(NEUTRAL_SCORE).clamp(MIN_SCORE, MAX_SCORE);
    let reasoning = if reasoning.is_empty() {
        PLACEHOLDER_REASONING.to_string()
    } else {
        reasoning.join(" ")
    };
    if degraded && suggestions.is_empty() {
        suggestions.push(PLACEHOLDER_SUGGESTION.to_string());
    }

    ParsedScore {
        score,
        reasoning,
        suggestions,
        degraded,
    }
}
