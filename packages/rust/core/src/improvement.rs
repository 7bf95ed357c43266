//! Improvement orchestrator: rewrite a document through the AI provider.
//!
//! Requests go to an ordered list of fallback models. Usage caps and
//! server/runtime failures move on to the next model; anything else stops
//! immediately. Each answer is sanitized and length-checked before it is
//! accepted. Documents over the chunking threshold are improved one chunk at
//! a time and reassembled.

use std::sync::Arc;

use tracing::{Instrument, Span, debug, info, info_span, warn};

use contentcurator_markdown::{Chunker, ContentChunk};
use contentcurator_shared::{
    ChunkingConfig, CostInfo, CurationError, IntegrityThresholds, ModelOption, OperationKind,
    Result,
};

use crate::integrity::{sanitize_response, validate_length};
use crate::provider::{AiProvider, PromptOptions};
use crate::scoring::DimensionAnalysis;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One request made while improving a document.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    /// Chunk index, for chunked documents.
    pub chunk: Option<usize>,
    /// Position of the model in the fallback list.
    pub index: usize,
    pub model: ModelOption,
    /// Why the attempt was rejected, if it was.
    pub error: Option<String>,
}

/// A successful improvement.
#[derive(Debug, Clone)]
pub struct ImprovementOutcome {
    pub improved_text: String,
    /// Every answer received, including ones rejected by the integrity checks.
    pub cost: CostInfo,
    pub attempts: Vec<AttemptRecord>,
    /// Non-fatal observations (length warnings, boundary issues).
    pub notes: Vec<String>,
    /// Number of chunks the document was split into (1 when unchunked).
    pub chunks: usize,
}

/// Position of a chunk within its document.
#[derive(Debug, Clone, Copy)]
struct Part {
    index: usize,
    total: usize,
    overlap_lines: usize,
}

// ---------------------------------------------------------------------------
// Improver
// ---------------------------------------------------------------------------

pub struct Improver {
    provider: Arc<dyn AiProvider>,
    chunker: Chunker,
    thresholds: IntegrityThresholds,
    span: Span,
}

impl Improver {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        chunking: ChunkingConfig,
        thresholds: IntegrityThresholds,
        parent: &Span,
    ) -> Self {
        Self {
            provider,
            chunker: Chunker::new(chunking),
            thresholds,
            span: info_span!(parent: parent, "improver"),
        }
    }

    /// Produce an improved version of `text` guided by `analysis`.
    ///
    /// Fails with the last provider error when every model failed, with the
    /// first non-recoverable error otherwise, or with an integrity error when
    /// the accepted answer is unusable.
    pub async fn improve_content(
        &self,
        text: &str,
        analysis: &[DimensionAnalysis],
        models: &[ModelOption],
    ) -> Result<ImprovementOutcome> {
        if models.is_empty() {
            return Err(CurationError::validation(
                "improvement needs at least one model",
            ));
        }

        let span = info_span!(
            parent: &self.span,
            "improve_content",
            chars = text.len(),
            models = models.len()
        );
        async {
            let mut outcome = ImprovementOutcome {
                improved_text: String::new(),
                cost: CostInfo::default(),
                attempts: Vec::new(),
                notes: Vec::new(),
                chunks: 1,
            };

            let improved = if self.chunker.should_chunk(text) {
                self.improve_chunked(text, analysis, models, &mut outcome)
                    .await?
            } else {
                self.improve_single(text, analysis, models, None, &mut outcome)
                    .await?
            };

            let (ratio, note) = validate_length(text, &improved, &self.thresholds)?;
            if let Some(note) = note {
                warn!(%note, "length check");
                outcome.notes.push(note.to_string());
            }

            info!(
                ratio = %format!("{ratio:.2}"),
                cost = outcome.cost.total_cost,
                attempts = outcome.attempts.len(),
                "content improved"
            );
            outcome.improved_text = improved;
            Ok::<_, CurationError>(outcome)
        }
        .instrument(span)
        .await
    }

    async fn improve_chunked(
        &self,
        text: &str,
        analysis: &[DimensionAnalysis],
        models: &[ModelOption],
        outcome: &mut ImprovementOutcome,
    ) -> Result<String> {
        let chunks = self.chunker.chunk_by_headers(text);
        let total = chunks.len();
        outcome.chunks = total;
        info!(chunks = total, "document is large, improving in chunks");

        let mut improved: Vec<ContentChunk> = Vec::with_capacity(total);
        for (index, chunk) in chunks.iter().enumerate() {
            let part = Part {
                index,
                total,
                overlap_lines: self.chunker.config().overlap_lines,
            };
            let content = self
                .improve_single(&chunk.content, analysis, models, Some(part), outcome)
                .await?;

            if let Some(note) = validate_length(&chunk.content, &content, &self.thresholds)?.1 {
                outcome.notes.push(format!("part {}/{total}: {note}", index + 1));
            }

            improved.push(ContentChunk {
                character_count: content.chars().count(),
                content,
                ..chunk.clone()
            });
        }

        for issue in self.chunker.validate_chunk_boundaries(&chunks) {
            outcome.notes.push(issue.to_string());
        }
        Ok(self.chunker.reassemble_chunks(&improved))
    }

    /// Run one prompt through the fallback list.
    async fn improve_single(
        &self,
        text: &str,
        analysis: &[DimensionAnalysis],
        models: &[ModelOption],
        part: Option<Part>,
        outcome: &mut ImprovementOutcome,
    ) -> Result<String> {
        let prompt = build_improvement_prompt(text, analysis, part)?;
        let chunk = part.map(|p| p.index);
        let mut last_error = None;

        for (index, model) in models.iter().enumerate() {
            debug!(attempt = index + 1, of = models.len(), model = %model, "sending improvement request");

            let result = match self
                .provider
                .prompt(&prompt, &PromptOptions::for_model(model))
                .await
            {
                Ok(response) => {
                    outcome
                        .cost
                        .push(response.cost_info(OperationKind::Improvement, model));
                    sanitize_response(text, &response.content).map_err(CurationError::from)
                }
                Err(e) => Err(CurationError::from(e)),
            };

            match result {
                Ok(content) => {
                    outcome.attempts.push(AttemptRecord {
                        chunk,
                        index,
                        model: model.clone(),
                        error: None,
                    });
                    return Ok(content);
                }
                Err(e) => {
                    outcome.attempts.push(AttemptRecord {
                        chunk,
                        index,
                        model: model.clone(),
                        error: Some(e.to_string()),
                    });
                    if !e.is_recoverable() {
                        warn!(attempt = index + 1, model = %model, error = %e, "non-recoverable failure, giving up");
                        return Err(e);
                    }
                    warn!(
                        attempt = index + 1,
                        of = models.len(),
                        model = %model,
                        error = %e,
                        "recoverable failure, trying next model"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CurationError::validation("no models were tried")))
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

fn build_improvement_prompt(
    text: &str,
    analysis: &[DimensionAnalysis],
    part: Option<Part>,
) -> Result<String> {
    let analysis_json = serde_json::to_string_pretty(analysis)
        .map_err(|e| CurationError::parse(format!("failed to serialize analysis: {e}")))?;

    let mut prompt = String::from(
        "Improve the document below using the quality analysis. Address the weakest \
         dimensions first.\n\n\
         Rules:\n\
         - The result must be between 80% and 120% of the original length.\n\
         - Output only the complete improved document. No preamble, no commentary, \
           no surrounding code fence.\n\
         - Keep YAML frontmatter, code blocks and embedded components exactly as they are.\n\
         - Keep the heading structure.\n",
    );

    if let Some(part) = part {
        prompt.push_str(&format!(
            "\nThis is part {} of {} of a larger document. Improve only this part.\n",
            part.index + 1,
            part.total
        ));
        if part.index > 0 && part.overlap_lines > 0 {
            prompt.push_str(&format!(
                "Its first {} lines repeat the end of the previous part for context. \
                 Reproduce them unchanged.\n",
                part.overlap_lines
            ));
        }
    }

    prompt.push_str(&format!(
        "\nQuality analysis:\n{analysis_json}\n\nDocument:\n<document>\n{text}\n</document>\n"
    ));
    Ok(prompt)
}
