use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod aggregate;
mod alerts;
mod categorize;
mod config;
mod db;
mod error;
mod features;
mod input;
mod insights;
mod logging;
mod ml;
mod models;
mod pipeline;
mod report;
mod snapshot;
mod stats;

use crate::config::{AnalysisConfig, PolicyKind};
use crate::features::ScoringScheme;
use crate::ml::ModelSelection;
use crate::pipeline::{AnalysisRun, Pipeline};
use crate::snapshot::{JsonSnapshotStore, Snapshot, SnapshotStore};

#[derive(Parser)]
#[command(name = "swot-risk")]
#[command(about = "Employee SWOT risk scoring, department aggregation and alerting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Employee CSV export
    #[arg(long)]
    csv: PathBuf,
    /// TOML file with thresholds and model settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Categorization policy; required here or in the config file
    #[arg(long, value_enum)]
    policy: Option<PolicyKind>,
    /// Score weighting scheme
    #[arg(long, value_enum)]
    scheme: Option<ScoringScheme>,
    /// CSV of external model output (Employee_ID, cluster, attrition_probability)
    #[arg(long, conflicts_with = "fit_models")]
    annotations: Option<PathBuf>,
    /// Fit the built-in clustering, anomaly and attrition models
    #[arg(long)]
    fit_models: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the snapshot schema
    InitDb,
    /// List the highest-risk employees
    Score {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List prioritized alerts
    Alerts {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, default_value = "swot_report.md")]
        out: PathBuf,
        /// Also write the full run as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Also write one CSV line per employee with category and model output
        #[arg(long)]
        results: Option<PathBuf>,
        /// Compare against the latest snapshot in this history file
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Record this run's categories and show movement since the last one
    Snapshot {
        #[command(flatten)]
        run: RunArgs,
        /// Use a JSON history file instead of Postgres
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn analyze(args: &RunArgs) -> anyhow::Result<(AnalysisConfig, AnalysisRun)> {
    let config = AnalysisConfig::load(args.config.as_deref())?
        .with_overrides(args.scheme, args.policy);

    if config.policy == Some(PolicyKind::Cluster) && !args.fit_models && args.annotations.is_none() {
        anyhow::bail!("--policy cluster needs cluster ids from --fit-models or --annotations");
    }

    let mut pipeline = Pipeline::from_config(&config)?;
    if args.fit_models {
        pipeline = pipeline.with_models(ModelSelection::all());
    }
    if let Some(path) = &args.annotations {
        pipeline = pipeline.with_annotations(input::load_annotations(path)?);
    }

    let loaded = input::load_rows(&args.csv)?;
    let run = pipeline
        .run_loaded(&loaded)
        .with_context(|| format!("analysis of {} failed", args.csv.display()))?;
    Ok((config, run))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Score { run, limit } => {
            let (_, result) = analyze(&run)?;
            let mut ranked: Vec<_> = result.records.iter().collect();
            ranked.sort_by(|a, b| {
                b.scores()
                    .risk
                    .partial_cmp(&a.scores().risk)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            println!("Top employees by risk score:");
            for record in ranked.iter().take(limit) {
                let s = record.scores();
                println!(
                    "- {} ({}) {} risk {:.2}, productivity {:.2}, engagement {:.2}",
                    record.employee_id(),
                    record.department(),
                    record.category,
                    s.risk,
                    s.productivity,
                    s.engagement
                );
            }
            if !result.rejected.is_empty() {
                println!("{} records rejected.", result.rejected.len());
            }
        }
        Commands::Alerts { run, limit } => {
            let (_, result) = analyze(&run)?;
            if result.alerts.is_empty() {
                println!("No alerts raised.");
                return Ok(());
            }
            println!("{} alerts, most severe first:", result.alerts.len());
            for alert in result.alerts.iter().take(limit) {
                println!(
                    "- [{}] {} ({}, {}) risk {:.2}: {}",
                    alert.tier,
                    alert.employee_id,
                    alert.department,
                    alert.category,
                    alert.risk_score,
                    alert.recommendation
                );
            }
        }
        Commands::Report {
            run,
            out,
            json,
            results,
            history,
        } => {
            let (config, result) = analyze(&run)?;
            let movements = match &history {
                Some(path) => {
                    let previous = JsonSnapshotStore::new(path).latest().await?;
                    Some(snapshot::diff(previous.as_ref(), &result.records))
                }
                None => None,
            };
            let report = report::build_report(
                &run.csv.display().to_string(),
                Utc::now(),
                &result,
                movements.as_deref(),
                config.report.top_n,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());

            if let Some(path) = json {
                std::fs::write(&path, serde_json::to_string_pretty(&result)?)?;
                println!("Run details written to {}.", path.display());
            }
            if let Some(path) = results {
                input::save_results(&path, &result.records)?;
                println!("Per-employee results written to {}.", path.display());
            }
        }
        Commands::Snapshot { run, file } => {
            let (_, result) = analyze(&run)?;
            let store: Box<dyn SnapshotStore> = match file {
                Some(path) => Box::new(JsonSnapshotStore::new(path)),
                None => Box::new(db::PgSnapshotStore::new(connect().await?)),
            };

            let previous = store.latest().await?;
            let movements = snapshot::diff(previous.as_ref(), &result.records);
            let current = Snapshot::capture(result.policy, &result.records);
            store.save(&current).await?;

            match previous {
                Some(prev) => println!(
                    "Compared with run {} from {}: {} employees changed category.",
                    prev.run_id,
                    prev.taken_at.format("%Y-%m-%d %H:%M"),
                    movements
                        .iter()
                        .filter(|m| m.direction != snapshot::Direction::New)
                        .count()
                ),
                None => println!("No previous snapshot; baseline recorded."),
            }
            for movement in movements
                .iter()
                .filter(|m| m.direction != snapshot::Direction::New)
            {
                println!(
                    "- {} ({}): {} -> {} ({:?})",
                    movement.employee_id,
                    movement.department,
                    movement
                        .from
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                    movement.to,
                    movement.direction
                );
            }
            println!("Snapshot {} saved.", current.run_id);
        }
    }

    Ok(())
}
