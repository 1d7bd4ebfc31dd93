//! xrefmate command-line entry point.
//!
//! - `tables`: list the registered logic tables
//! - `match`: run a JSON array of match requests through the engine
//! - `qc`: aggregate a recommendation log database into QC statistics

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use xrefmate::batch::run_bounded;
use xrefmate::matching::{critical_missing, top_n, MatchOutcome, MatchRequest};
use xrefmate::qc::{collect_qc_input, QcFilters, SqliteLogStore};
use xrefmate::{init_tracing, EngineConfig, MatchingEngine};

#[derive(Parser, Debug)]
#[command(name = "xrefmate")]
#[command(about = "Cross-reference matching and recommendation QC for electronic components")]
#[command(version)]
struct Args {
    /// Config file (defaults to XREFMATE_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered families and their rules
    Tables,

    /// Score candidates for each request in a JSON file
    Match {
        /// JSON array of match requests
        requests: PathBuf,

        /// Keep only the best N recommendations per request
        #[arg(long)]
        top: Option<usize>,

        /// Requests processed at once (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Aggregate logged recommendations into QC statistics
    Qc {
        /// Recommendation log database
        #[arg(long)]
        db: PathBuf,

        #[arg(long)]
        family: Option<String>,

        /// Start date (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<DateTime<Utc>>,

        /// End date (RFC 3339 or YYYY-MM-DD, inclusive)
        #[arg(long, value_parser = parse_end_date)]
        to: Option<DateTime<Utc>>,

        /// Request channel, e.g. "chat" or "api"
        #[arg(long)]
        source: Option<String>,

        /// Free-text search over source MPN and family name
        #[arg(long)]
        search: Option<String>,

        /// Only logs with user feedback
        #[arg(long)]
        has_feedback: bool,
    },
}

#[derive(Serialize)]
struct TableSummary<'a> {
    family_id: &'a str,
    family_name: &'a str,
    category: &'a str,
    rule_count: usize,
    total_weight: f64,
    context_questions: usize,
}

#[derive(Serialize)]
struct MatchReport {
    #[serde(flatten)]
    outcome: MatchOutcome,
    /// Missing source attributes heavy enough to warrant asking the user
    critical_missing: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load config")?;
    init_tracing(&config.log_filter);

    match args.command {
        Command::Tables => list_tables(&config),
        Command::Match {
            requests,
            top,
            concurrency,
        } => run_match(&config, requests, top, concurrency).await,
        Command::Qc {
            db,
            family,
            from,
            to,
            source,
            search,
            has_feedback,
        } => {
            let filters = QcFilters {
                date_from: from,
                date_to: to,
                family_id: family,
                request_source: source,
                search,
                has_feedback,
            };
            run_qc(config, db, filters).await
        }
    }
}

fn list_tables(config: &EngineConfig) -> Result<()> {
    let registry = config.load_registry()?;
    let summaries: Vec<TableSummary> = registry
        .list_all()
        .iter()
        .map(|t| TableSummary {
            family_id: &t.family_id,
            family_name: &t.family_name,
            category: &t.category,
            rule_count: t.rules.len(),
            total_weight: t.total_weight(),
            context_questions: t.context_questions.len(),
        })
        .collect();
    print_json(&summaries)
}

async fn run_match(
    config: &EngineConfig,
    requests_path: PathBuf,
    top: Option<usize>,
    concurrency: Option<usize>,
) -> Result<()> {
    let content = std::fs::read_to_string(&requests_path)
        .with_context(|| format!("Failed to read {}", requests_path.display()))?;
    let requests: Vec<MatchRequest> =
        serde_json::from_str(&content).context("Failed to parse match requests")?;

    let registry = config.load_registry()?;
    let engine = MatchingEngine::new(&registry);
    let critical_weight = config.critical_weight;
    let concurrency = concurrency.unwrap_or(config.batch_concurrency);
    info!("Matching {} requests", requests.len());

    let progress = run_bounded(requests, concurrency, |_, request| {
        let engine = &engine;
        async move {
            let mut outcome = engine.recommend(&request)?;
            if let Some(n) = top {
                outcome.recommendations = top_n(outcome.recommendations, n);
            }
            let critical = critical_missing(&outcome.missing_attributes, critical_weight)
                .into_iter()
                .map(|m| m.attribute_id.clone())
                .collect();
            Ok::<_, xrefmate::XrefError>(MatchReport {
                outcome,
                critical_missing: critical,
            })
        }
    })
    .await;

    print_json(&progress)
}

async fn run_qc(config: EngineConfig, db: PathBuf, filters: QcFilters) -> Result<()> {
    let registry = config.load_registry()?;
    let input = tokio::task::spawn_blocking(move || {
        let store = SqliteLogStore::open(&db)?;
        collect_qc_input(&store, &filters, &registry, &config)
    })
    .await
    .context("QC task panicked")??;
    print_json(&input)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_date_at(value, 0, 0, 0)
}

fn parse_end_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_date_at(value, 23, 59, 59)
}

/// RFC 3339 timestamps pass through; bare dates take the given time of day.
fn parse_date_at(value: &str, h: u32, m: u32, s: u32) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(h, m, s))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("Invalid date '{}': expected RFC 3339 or YYYY-MM-DD", value))
}
