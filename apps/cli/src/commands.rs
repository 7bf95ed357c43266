//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use contentcurator_core::{
    BatchReport, CommandProvider, ContentPipeline, ProgressReporter, cost_summary, roi_analysis,
};
use contentcurator_shared::{AppConfig, init_config, load_config, load_config_from};
use contentcurator_storage::{canonical_key, relative_key};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, info_span};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ContentCurator: AI-driven documentation quality management.
#[derive(Parser)]
#[command(
    name = "contentcurator",
    version,
    about = "Score documentation across five quality dimensions and improve it with AI providers.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./contentcurator.toml, then ~/.contentcurator/).
    #[arg(short, long, global = true, env = "CONTENTCURATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Discover documents and register new ones in the content database.
    Scan,

    /// Score documents on every quality dimension.
    Review {
        /// Documents to review. Defaults to documents pending review.
        paths: Vec<PathBuf>,

        /// Review every tracked document.
        #[arg(long, conflicts_with = "paths")]
        all: bool,
    },

    /// Rewrite documents with AI and rescore them.
    Improve {
        /// Documents to improve.
        paths: Vec<PathBuf>,

        /// Improve the N lowest-scoring documents that miss their targets.
        #[arg(long, conflicts_with = "paths")]
        worst: Option<usize>,
    },

    /// Show quality scores and status for every tracked document.
    Status,

    /// Summarize spending.
    Costs {
        /// Restrict the summary to one document.
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Rank improved documents by cost per quality point.
    Roi,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "contentcurator=info",
        1 => "contentcurator=debug",
        _ => "contentcurator=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
        Command::Scan => cmd_scan(&open_pipeline(config_path).await?).await,
        Command::Review { paths, all } => {
            cmd_review(&open_pipeline(config_path).await?, paths, all).await
        }
        Command::Improve { paths, worst } => {
            cmd_improve(&open_pipeline(config_path).await?, paths, worst).await
        }
        Command::Status => cmd_status(&open_pipeline(config_path).await?).await,
        Command::Costs { path } => cmd_costs(&open_pipeline(config_path).await?, path).await,
        Command::Roi => cmd_roi(&open_pipeline(config_path).await?).await,
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn open_pipeline(config_path: Option<&Path>) -> Result<ContentPipeline> {
    let config = resolve_config(config_path)?;
    let provider = Arc::new(CommandProvider::new(config.provider.clone()));
    let root = info_span!("contentcurator");
    let pipeline = ContentPipeline::open(config, provider, &root).await?;
    Ok(pipeline)
}

/// A path as shown to the user: relative to the working directory when
/// possible.
fn display_path(path: &Path) -> String {
    match std::env::current_dir() {
        Ok(cwd) => relative_key(path, &cwd),
        Err(_) => path.display().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_scan(pipeline: &ContentPipeline) -> Result<()> {
    let report = pipeline.discover().await?;
    println!();
    println!("  Documents found:   {}", report.found);
    println!("  Newly registered:  {}", report.created);
    println!("  Database:          {}", display_path(pipeline.store().path()));
    println!();
    Ok(())
}

async fn cmd_review(pipeline: &ContentPipeline, paths: Vec<PathBuf>, all: bool) -> Result<()> {
    pipeline.discover().await?;

    let targets = if all {
        pipeline
            .store()
            .entries()
            .await
            .into_iter()
            .map(|(path, _)| path)
            .collect()
    } else if paths.is_empty() {
        pipeline.pending_review().await
    } else {
        paths
    };

    if targets.is_empty() {
        println!("Nothing to review.");
        return Ok(());
    }
    info!(documents = targets.len(), "reviewing documents");

    let progress = CliProgress::new(targets.len());
    let report = pipeline.batch_review(&targets, &progress).await?;

    println!();
    println!("  {:<48} {:>7}  {:<17}  {:>9}", "Document", "Average", "Status", "Cost");
    for review in &report.succeeded {
        println!(
            "  {:<48} {:>7.2}  {:<17}  ${:>8.4}",
            display_path(&review.path),
            review.scores.average(),
            review.status.as_str(),
            review.cost,
        );
        if !review.degraded.is_empty() {
            let names: Vec<String> = review.degraded.iter().map(ToString::to_string).collect();
            println!("      unparsed scores defaulted: {}", names.join(", "));
        }
    }
    finish_batch(&report)
}

async fn cmd_improve(
    pipeline: &ContentPipeline,
    paths: Vec<PathBuf>,
    worst: Option<usize>,
) -> Result<()> {
    let targets = match worst {
        Some(n) => pipeline.select_worst(n).await,
        None if paths.is_empty() => {
            return Err(eyre!("name documents to improve, or pass --worst <N>"));
        }
        None => paths,
    };

    if targets.is_empty() {
        println!("Every reviewed document meets its targets.");
        return Ok(());
    }
    info!(documents = targets.len(), "improving documents");

    let progress = CliProgress::new(targets.len());
    let report = pipeline.batch_improve(&targets, &progress).await?;

    println!();
    println!("  {:<48} {:>6} {:>6}  {:<17}  {:>9}", "Document", "Before", "After", "Status", "Cost");
    for improvement in &report.succeeded {
        println!(
            "  {:<48} {:>6.2} {:>6.2}  {:<17}  ${:>8.4}",
            display_path(&improvement.path),
            improvement.score_before,
            improvement.score_after,
            improvement.status.as_str(),
            improvement.cost,
        );
        for note in &improvement.notes {
            println!("      note: {note}");
        }
    }
    finish_batch(&report)
}

/// Print the batch footer; any failed document fails the command.
fn finish_batch<T>(report: &BatchReport<T>) -> Result<()> {
    for failure in &report.failed {
        println!("  FAILED {}: {}", display_path(&failure.path), failure.error);
    }
    println!();
    println!(
        "  {} succeeded, {} failed in {:.1}s",
        report.succeeded.len(),
        report.failed.len(),
        report.elapsed.as_secs_f64()
    );
    println!();

    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(eyre!("{} document(s) failed", report.failed.len()))
    }
}

async fn cmd_status(pipeline: &ContentPipeline) -> Result<()> {
    let entries = pipeline.store().entries().await;
    if entries.is_empty() {
        println!("No documents tracked yet. Run `contentcurator scan` first.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<48} {:>5} {:>5} {:>5} {:>5} {:>5} {:>7}  {:<17} {:>4}",
        "Document", "Read", "SEO", "Tech", "Eng", "Depth", "Average", "Status", "Iter"
    );
    for (path, entry) in &entries {
        let s = &entry.current_scores;
        println!(
            "  {:<48} {:>5.1} {:>5.1} {:>5.1} {:>5.1} {:>5.1} {:>7.2}  {:<17} {:>4}",
            display_path(path),
            s.readability,
            s.seo,
            s.technical_accuracy,
            s.engagement,
            s.content_depth,
            s.average(),
            entry.status.as_str(),
            entry.improvement_iterations,
        );
    }
    println!();
    Ok(())
}

async fn cmd_costs(pipeline: &ContentPipeline, path: Option<PathBuf>) -> Result<()> {
    let key = path.as_deref().map(canonical_key).transpose()?;
    let db = pipeline.store().snapshot().await;
    if let Some(k) = key.as_deref().filter(|k| !db.entries.contains_key(*k)) {
        return Err(eyre!("'{k}' is not tracked in the content database"));
    }

    let summary = cost_summary(&db, key.as_deref());
    println!();
    println!("  Documents:            {}", summary.documents);
    println!("  Operations:           {}", summary.operations);
    println!("  Review costs:         ${:.4}", summary.review_costs);
    println!("  Improvement costs:    ${:.4}", summary.improvement_costs);
    println!("  Generation costs:     ${:.4}", summary.generation_costs);
    println!("  Total:                ${:.4}", summary.total_cost);
    println!("  Quality gained:       {:.2} points", summary.total_quality_gain);
    println!("  Cost per point:       ${:.4}", summary.average_cost_per_quality_point);
    println!();
    Ok(())
}

async fn cmd_roi(pipeline: &ContentPipeline) -> Result<()> {
    let analysis = roi_analysis(&pipeline.store().snapshot().await);
    if analysis.documents.is_empty() {
        println!("No documents have been improved yet.");
        return Ok(());
    }

    println!();
    println!("  {:<48} {:>10} {:>7} {:>5} {:>10}", "Document", "Invested", "Gain", "Iter", "$/point");
    for doc in &analysis.documents {
        let per_point = doc
            .cost_per_point
            .map_or_else(|| "-".to_string(), |c| format!("${c:.4}"));
        println!(
            "  {:<48} ${:>9.4} {:>7.2} {:>5} {:>10}",
            display_path(Path::new(&doc.path)),
            doc.investment,
            doc.quality_gain,
            doc.iterations,
            per_point,
        );
    }

    if !analysis.diminishing_returns.is_empty() {
        println!();
        println!("  Diminishing returns:");
        for doc in &analysis.diminishing_returns {
            println!("    {}", display_path(Path::new(&doc.path)));
            for it in &doc.iterations {
                println!(
                    "      #{:<3} cost ${:.4}  gain {:+.2}  {:.1} points/$",
                    it.iteration, it.cost, it.quality_gain, it.efficiency
                );
            }
        }
    }
    println!();
    Ok(())
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = init_config(path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Batch progress bar using indicatif.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn document_done(&self, path: &Path, current: usize, _total: usize, ok: bool) {
        let mark = if ok { "done" } else { "failed" };
        self.bar.set_position(current as u64);
        self.bar.set_message(format!("{mark} {}", display_path(path)));
    }

    fn done(&self, _succeeded: usize, _failed: usize) {
        self.bar.finish_and_clear();
    }
}
