//! Cost and return-on-investment reporting over the content database.

use std::cmp::Ordering;

use serde::Serialize;

use contentcurator_shared::{ContentDatabase, ContentEntry};

/// Pipeline-wide (or single-document) spending.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub review_costs: f64,
    pub improvement_costs: f64,
    pub generation_costs: f64,
    pub total_cost: f64,
    pub documents: usize,
    pub operations: usize,
    /// Sum of positive quality deltas.
    pub total_quality_gain: f64,
    /// Improvement spend per point of positive quality gain; 0 without gains.
    pub average_cost_per_quality_point: f64,
}

/// Value obtained from improving one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRoi {
    pub path: String,
    /// Everything spent on the document, reviews included. This differs from
    /// [`CostSummary::average_cost_per_quality_point`], which counts only the
    /// improvement spend of iterations that gained quality.
    pub investment: f64,
    pub quality_gain: f64,
    pub iterations: u32,
    /// `investment / quality_gain`, absent when nothing was gained.
    pub cost_per_point: Option<f64>,
}

/// Outcome of one improvement iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationRoi {
    pub iteration: u32,
    pub cost: f64,
    pub quality_gain: f64,
    /// Quality points per USD.
    pub efficiency: f64,
}

/// A document improved more than once, with its per-iteration returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiminishingReturns {
    pub path: String,
    pub iterations: Vec<IterationRoi>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiAnalysis {
    /// Best value first; documents without gain last.
    pub documents: Vec<DocumentRoi>,
    pub diminishing_returns: Vec<DiminishingReturns>,
}

/// Iterations with metrics, as `(iteration, cost, delta)`.
fn iterations(entry: &ContentEntry) -> impl Iterator<Item = (u32, f64, f64)> + '_ {
    entry.review_history.iter().filter_map(|h| {
        let metrics = h.improvement_metrics.as_ref()?;
        let cost = h.cost_info.as_ref().map_or(0.0, |c| c.total_cost);
        Some((metrics.iteration_number, cost, metrics.quality_delta))
    })
}

/// Sum spending across all entries, or only the entry keyed `path_filter`.
pub fn cost_summary(db: &ContentDatabase, path_filter: Option<&str>) -> CostSummary {
    let mut summary = CostSummary::default();
    let mut gain_cost = 0.0;

    let selected = db
        .entries
        .iter()
        .filter(|(path, _)| path_filter.is_none_or(|p| p == path.as_str()));

    for (_, entry) in selected {
        let accounting = &entry.cost_accounting;
        summary.review_costs += accounting.review_costs;
        summary.improvement_costs += accounting.improvement_costs;
        summary.generation_costs += accounting.generation_costs;
        summary.operations += accounting.operation_history.len();
        summary.documents += 1;

        for (_, cost, delta) in iterations(entry) {
            if delta > 0.0 {
                gain_cost += cost;
                summary.total_quality_gain += delta;
            }
        }
    }

    summary.total_cost = summary.review_costs + summary.improvement_costs + summary.generation_costs;
    if summary.total_quality_gain > 0.0 {
        summary.average_cost_per_quality_point = gain_cost / summary.total_quality_gain;
    }
    summary
}

/// Rank improved documents by cost per quality point and list the ones
/// improved at least twice.
pub fn roi_analysis(db: &ContentDatabase) -> RoiAnalysis {
    let mut analysis = RoiAnalysis::default();

    for (path, entry) in &db.entries {
        if entry.improvement_iterations == 0 {
            continue;
        }

        let quality_gain: f64 = iterations(entry).map(|(_, _, delta)| delta).sum();
        let investment = entry.cost_accounting.total_cost;
        analysis.documents.push(DocumentRoi {
            path: path.clone(),
            investment,
            quality_gain,
            iterations: entry.improvement_iterations,
            cost_per_point: (quality_gain > 0.0).then(|| investment / quality_gain),
        });

        if entry.improvement_iterations >= 2 {
            analysis.diminishing_returns.push(DiminishingReturns {
                path: path.clone(),
                iterations: iterations(entry)
                    .map(|(iteration, cost, quality_gain)| IterationRoi {
                        iteration,
                        cost,
                        quality_gain,
                        efficiency: if cost > 0.0 { quality_gain / cost } else { 0.0 },
                    })
                    .collect(),
            });
        }
    }

    analysis
        .documents
        .sort_by(|a, b| match (a.cost_per_point, b.cost_per_point) {
            (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.path.cmp(&b.path)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.path.cmp(&b.path),
        });
    analysis
}
