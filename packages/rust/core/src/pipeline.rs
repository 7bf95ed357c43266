//! Document workflows over the content store: discover, review, improve,
//! and their batch forms.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tracing::{Instrument, Span, info, info_span, warn};

use contentcurator_shared::{
    AppConfig, ContentEntry, ContentStatus, CostInfo, CurationError, Dimension,
    QualityDimensions, QualityImprovementMetrics, Result, ReviewHistoryEntry,
};
use contentcurator_storage::{ContentStore, normalize_path};

use crate::improvement::Improver;
use crate::provider::AiProvider;
use crate::scanner::ContentScanner;
use crate::scoring::{DimensionAnalysis, Scorer};
use crate::status::determine_status;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of a discovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub found: usize,
    pub created: usize,
}

/// Result of reviewing one document.
#[derive(Debug, Clone)]
pub struct ReviewReport {
    pub path: PathBuf,
    pub scores: QualityDimensions,
    pub status: ContentStatus,
    pub cost: f64,
    /// Dimensions whose answers could not be parsed.
    pub degraded: Vec<Dimension>,
}

/// Result of improving one document.
#[derive(Debug, Clone)]
pub struct ImprovementReport {
    pub path: PathBuf,
    pub score_before: f64,
    pub score_after: f64,
    pub status: ContentStatus,
    /// Improvement plus any scoring done around it.
    pub cost: f64,
    pub iteration: u32,
    pub notes: Vec<String>,
}

/// A document that failed inside a batch.
#[derive(Debug)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: CurationError,
}

/// Per-document outcomes of a batch.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BatchFailure>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for batch operations.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a document finishes, successfully or not.
    fn document_done(&self, path: &Path, current: usize, total: usize, ok: bool);
    /// Called when the batch completes.
    fn done(&self, succeeded: usize, failed: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_done(&self, _path: &Path, _current: usize, _total: usize, _ok: bool) {}
    fn done(&self, _succeeded: usize, _failed: usize) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Ties the store, scanner, scorer and improver together.
pub struct ContentPipeline {
    config: AppConfig,
    store: Arc<ContentStore>,
    scanner: ContentScanner,
    scorer: Scorer,
    improver: Improver,
    span: Span,
}

impl ContentPipeline {
    pub fn new(
        config: AppConfig,
        store: Arc<ContentStore>,
        provider: Arc<dyn AiProvider>,
        parent: &Span,
    ) -> Result<Self> {
        let span = info_span!(parent: parent, "pipeline");
        Ok(Self {
            scanner: ContentScanner::new(&config.content)?,
            scorer: Scorer::new(provider.clone(), config.scoring.clone(), &span),
            improver: Improver::new(
                provider,
                config.chunking.clone(),
                config.improvement.thresholds,
                &span,
            ),
            store,
            config,
            span,
        })
    }

    /// Open the store named in the config and build a pipeline on it.
    pub async fn open(
        config: AppConfig,
        provider: Arc<dyn AiProvider>,
        parent: &Span,
    ) -> Result<Self> {
        let store = ContentStore::open(Path::new(&config.content.database)).await?;
        Self::new(config, Arc::new(store), provider, parent)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Create entries for every document found on disk that the store does
    /// not know yet, and record the configuration in the store.
    pub async fn discover(&self) -> Result<DiscoveryReport> {
        let span = info_span!(parent: &self.span, "discover");
        async {
            let paths = self.scanner.scan_content().await?;
            let mut created = 0;
            for path in &paths {
                if self.store.ensure_entry(path, self.config.targets).await? {
                    created += 1;
                }
            }

            let snapshot = serde_json::to_value(&self.config)
                .map_err(|e| CurationError::parse(format!("failed to serialize config: {e}")))?;
            self.store.set_config(snapshot).await?;

            info!(found = paths.len(), created, "discovery complete");
            Ok::<_, CurationError>(DiscoveryReport {
                found: paths.len(),
                created,
            })
        }
        .instrument(span)
        .await
    }

    /// Score a document and record the result.
    pub async fn review_document(&self, path: &Path) -> Result<ReviewReport> {
        let path = normalize_path(path)?;
        let span = info_span!(parent: &self.span, "review_document", path = %path.display());
        async {
            let text = self.scanner.read_content(&path).await?;
            self.store.ensure_entry(&path, self.config.targets).await?;
            let result = self.scorer.score_content(&text, None).await?;
            let suggestions = result.suggestions();

            let entry = self
                .store
                .modify_entry(&path, |entry| {
                    entry.cost_accounting.add_cost_info(&result.cost_breakdown);
                    entry.current_scores = result.scores;
                    entry.review_history.push(ReviewHistoryEntry {
                        date: Utc::now(),
                        scores: result.scores,
                        improvements: suggestions,
                        cost_info: Some(result.cost_breakdown.clone()),
                        improvement_metrics: None,
                    });
                    entry.status = determine_status(&entry.current_scores);
                })
                .await?;

            info!(
                average = %format!("{:.2}", entry.current_scores.average()),
                status = %entry.status,
                cost = result.total_cost,
                "document reviewed"
            );
            Ok::<_, CurationError>(ReviewReport {
                degraded: result.degraded_dimensions(),
                path: path.clone(),
                scores: entry.current_scores,
                status: entry.status,
                cost: result.total_cost,
            })
        }
        .instrument(span)
        .await
    }

    /// Improve a document, re-score it, write it back and record the gain.
    ///
    /// Documents that were never reviewed are scored first so the improvement
    /// has an analysis to work from. The file is replaced only once the new
    /// text has been scored; on failure, the spend so far is still recorded.
    pub async fn improve_document(&self, path: &Path) -> Result<ImprovementReport> {
        let path = normalize_path(path)?;
        let span = info_span!(parent: &self.span, "improve_document", path = %path.display());
        async {
            let entry = self
                .store
                .get_entry(&path)
                .await?
                .ok_or_else(|| CurationError::entry_not_found(&path))?;
            let text = self.scanner.read_content(&path).await?;

            let (analysis, initial_review) = if entry.is_reviewed() {
                (analysis_from_history(&entry, &self.config), None)
            } else {
                let review = self.scorer.score_content(&text, None).await?;
                let initial = InitialReview {
                    scores: review.scores,
                    suggestions: review.suggestions(),
                    cost: review.cost_breakdown.clone(),
                };
                (review.analysis, Some(initial))
            };

            let outcome = match self
                .improver
                .improve_content(&text, &analysis, &self.config.improvement.models)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.record_spent(&path, initial_review, &[]).await?;
                    return Err(e);
                }
            };

            let rescore = match self.scorer.score_content(&outcome.improved_text, None).await {
                Ok(rescore) => rescore,
                Err(e) => {
                    self.record_spent(&path, initial_review, &[&outcome.cost])
                        .await?;
                    return Err(e);
                }
            };

            if let Err(e) = self
                .scanner
                .write_content(&path, &outcome.improved_text)
                .await
            {
                self.record_spent(&path, initial_review, &[&outcome.cost, &rescore.cost_breakdown])
                    .await?;
                return Err(e);
            }

            let after = rescore.scores;
            let total_cost = outcome.cost.total_cost
                + rescore.total_cost
                + initial_review.as_ref().map_or(0.0, |r| r.cost.total_cost);
            let rescore_suggestions = rescore.suggestions();
            let mut metrics = None;
            let entry = self
                .store
                .modify_entry(&path, |entry| {
                    if let Some(initial) = initial_review {
                        initial.apply(entry);
                    }
                    let before = entry.current_scores.average();
                    entry.cost_accounting.add_cost_info(&outcome.cost);
                    entry.cost_accounting.add_cost_info(&rescore.cost_breakdown);
                    entry.improvement_iterations += 1;
                    let iteration_metrics = QualityImprovementMetrics::new(
                        before,
                        after.average(),
                        outcome.cost.total_cost,
                        entry.improvement_iterations,
                    );
                    entry.current_scores = after;
                    entry.review_history.push(ReviewHistoryEntry {
                        date: Utc::now(),
                        scores: after,
                        improvements: rescore_suggestions,
                        cost_info: Some(outcome.cost.clone()),
                        improvement_metrics: Some(iteration_metrics.clone()),
                    });
                    entry.status = determine_status(&entry.current_scores);
                    metrics = Some(iteration_metrics);
                })
                .await?;
            let metrics = metrics.ok_or_else(|| CurationError::entry_not_found(&path))?;

            info!(
                before = %format!("{:.2}", metrics.score_before),
                after = %format!("{:.2}", metrics.score_after),
                iteration = metrics.iteration_number,
                status = %entry.status,
                "document improved"
            );
            Ok::<_, CurationError>(ImprovementReport {
                path: path.clone(),
                score_before: metrics.score_before,
                score_after: metrics.score_after,
                status: entry.status,
                cost: total_cost,
                iteration: metrics.iteration_number,
                notes: outcome.notes,
            })
        }
        .instrument(span)
        .await
    }

    /// Record what a failed improvement already paid for. The entry's scores,
    /// iteration count and document are left alone.
    async fn record_spent(
        &self,
        path: &Path,
        initial_review: Option<InitialReview>,
        spent: &[&CostInfo],
    ) -> Result<()> {
        if initial_review.is_none() && spent.is_empty() {
            return Ok(());
        }
        self.store
            .modify_entry(path, |entry| {
                if let Some(initial) = initial_review {
                    initial.apply(entry);
                }
                for cost in spent {
                    entry.cost_accounting.add_cost_info(cost);
                }
            })
            .await?;
        Ok(())
    }

    /// Lowest-scoring reviewed documents that do not yet meet their targets.
    pub async fn select_worst(&self, limit: usize) -> Vec<PathBuf> {
        let mut candidates: Vec<(PathBuf, f64)> = self
            .store
            .entries()
            .await
            .into_iter()
            .filter(|(_, e)| e.is_reviewed() && e.status != ContentStatus::MeetsTargets)
            .map(|(path, e)| (path, e.current_scores.average()))
            .collect();

        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        candidates
            .into_iter()
            .take(limit)
            .map(|(path, _)| path)
            .collect()
    }

    /// Documents never reviewed, or whose last review left them needing one.
    pub async fn pending_review(&self) -> Vec<PathBuf> {
        self.store
            .entries()
            .await
            .into_iter()
            .filter(|(_, e)| !e.is_reviewed() || e.status == ContentStatus::NeedsReview)
            .map(|(path, _)| path)
            .collect()
    }

    pub async fn batch_review(
        &self,
        paths: &[PathBuf],
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport<ReviewReport>> {
        progress.phase("Reviewing documents");
        let paths = unique_paths(paths);
        self.run_batch(&paths, progress, |p| self.review_document(p))
            .await
    }

    pub async fn batch_improve(
        &self,
        paths: &[PathBuf],
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport<ImprovementReport>> {
        progress.phase("Improving documents");
        let paths = unique_paths(paths);
        self.run_batch(&paths, progress, |p| self.improve_document(p))
            .await
    }

    /// Run `op` over `paths` in groups of `batch.size`: concurrently within
    /// a group, sequentially across groups with a pause in between.
    ///
    /// Per-document failures are collected; a store failure aborts the batch.
    async fn run_batch<'a, T, F, Fut>(
        &'a self,
        paths: &'a [PathBuf],
        progress: &dyn ProgressReporter,
        op: F,
    ) -> Result<BatchReport<T>>
    where
        F: Fn(&'a Path) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let total = paths.len();
        let size = self.config.batch.size.max(1);
        let pause = Duration::from_millis(self.config.batch.pause_ms);
        let mut report = BatchReport {
            succeeded: Vec::new(),
            failed: Vec::new(),
            elapsed: Duration::ZERO,
        };
        let mut current = 0;

        for (group_index, group) in paths.chunks(size).enumerate() {
            if group_index > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let results = join_all(group.iter().map(|p| op(p.as_path()))).await;
            for (path, result) in group.iter().zip(results) {
                current += 1;
                match result {
                    Ok(value) => {
                        progress.document_done(path, current, total, true);
                        report.succeeded.push(value);
                    }
                    Err(e) if e.is_store_fatal() => {
                        warn!(path = %path.display(), error = %e, "store failure, aborting batch");
                        return Err(e);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "document failed");
                        progress.document_done(path, current, total, false);
                        report.failed.push(BatchFailure {
                            path: path.clone(),
                            error: e,
                        });
                    }
                }
            }
        }

        report.elapsed = start.elapsed();
        progress.done(report.succeeded.len(), report.failed.len());
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "batch complete"
        );
        Ok(report)
    }
}

/// A first review taken while improving a document that had none.
struct InitialReview {
    scores: QualityDimensions,
    suggestions: Vec<String>,
    cost: CostInfo,
}

impl InitialReview {
    fn apply(self, entry: &mut ContentEntry) {
        entry.cost_accounting.add_cost_info(&self.cost);
        entry.current_scores = self.scores;
        entry.status = determine_status(&self.scores);
        entry.review_history.push(ReviewHistoryEntry {
            date: Utc::now(),
            scores: self.scores,
            improvements: self.suggestions,
            cost_info: Some(self.cost),
            improvement_metrics: None,
        });
    }
}

/// `paths` with duplicates removed, comparing normalized paths and keeping
/// the first occurrence. Paths that cannot be normalized are kept as given.
fn unique_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|p| seen.insert(normalize_path(p).unwrap_or_else(|_| p.to_path_buf())))
        .cloned()
        .collect()
}

/// Rebuild a scoring analysis from an entry's stored scores and the
/// suggestions of its latest history entry.
fn analysis_from_history(entry: &ContentEntry, config: &AppConfig) -> Vec<DimensionAnalysis> {
    let latest = entry.review_history.last();
    Dimension::ALL
        .into_iter()
        .map(|dimension| {
            let prefix = format!("{}: ", dimension.label());
            let suggestions = latest
                .map(|h| {
                    h.improvements
                        .iter()
                        .filter_map(|s| s.strip_prefix(&prefix).map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            DimensionAnalysis {
                dimension,
                score: entry.current_scores.get(dimension),
                reasoning: "Score from the most recent review.".into(),
                suggestions,
                model: config.scoring.model_for(dimension),
                degraded: false,
            }
        })
        .collect()
}
