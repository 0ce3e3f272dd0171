use std::path::PathBuf;

use anyhow::Context;
use chrono::FixedOffset;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

mod aggregator;
mod analytics;
mod config;
mod db;
mod error;
mod models;
mod period;
mod report;
mod snapshot;
mod store;

use config::{Config, DEFAULT_MAX_CONNECTIONS};
use db::PgStore;
use period::{resolve_months, resolve_window, Period, TimeRange, DEFAULT_UTC_OFFSET};

#[derive(Parser)]
#[command(name = "helpdesk-analytics")]
#[command(
    about = "Survey and cohort analytics for the helpdesk ticketing backend",
    long_about = None
)]
struct Cli {
    /// Postgres connection URL; falls back to DB_HOST/DB_PORT/DB_USER/DB_PASSWORD/DB_NAME
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[arg(
        long,
        env = "DB_MAX_CONNECTIONS",
        global = true,
        default_value_t = DEFAULT_MAX_CONNECTIONS
    )]
    max_connections: u32,

    /// UTC offset of the reporting time zone; months start at local midnight
    #[arg(long, env = "REPORT_UTC_OFFSET", global = true, default_value = DEFAULT_UTC_OFFSET)]
    utc_offset: FixedOffset,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// A lone `--from` or `--to` selects that single month.
#[derive(Args)]
struct WindowArgs {
    /// First month of the window (YYYY-MM)
    #[arg(long)]
    from: Option<String>,
    /// Last month of the window (YYYY-MM)
    #[arg(long)]
    to: Option<String>,
}

impl WindowArgs {
    fn months(&self) -> error::Result<Option<(Period, Period)>> {
        resolve_months(self.from.as_deref(), self.to.as_deref())
    }

    fn range(&self, offset: FixedOffset) -> error::Result<Option<TimeRange>> {
        resolve_window(self.from.as_deref(), self.to.as_deref(), offset)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load service categories, questionnaires and sample tickets
    Seed,
    /// Import tickets and satisfaction scores from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute cohort statistics for a month without storing them
    Cohort {
        /// Month to analyse (YYYY-MM), defaults to the current month
        #[arg(long)]
        period: Option<String>,
        /// Service category name or id
        #[arg(long)]
        category: Option<String>,
    },
    /// Compute and store the cohort snapshot for a month
    SaveCohort {
        /// Month to snapshot (YYYY-MM), defaults to the previous month
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List stored cohort snapshots
    CohortHistory {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        category: Option<String>,
    },
    /// Ticket counts per status
    Status {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Ticket counts per requester type
    Entities {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Average satisfaction per month
    SatisfactionTrend {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Categories ranked by ticket volume
    TopIssues {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value_t = analytics::DEFAULT_TOP_ISSUES)]
        limit: usize,
    },
    /// Time from creation to resolution
    ResolutionTime {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Ticket volume per category per month
    ServiceTrends {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Answer tallies per survey question
    Questions {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        category: Option<String>,
    },
    /// Combined dashboard summary
    Dashboard {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value_t = analytics::DEFAULT_TOP_ISSUES)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value = "helpdesk-report.md")]
        out: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "helpdesk_analytics=debug,sqlx=info"
    } else {
        "helpdesk_analytics=info,sqlx=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(config.connect_options.clone())
        .await
        .context("failed to connect to Postgres")
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

fn parse_period(raw: Option<&str>, default: Period) -> anyhow::Result<Period> {
    match raw {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(default),
    }
}

fn window_label(window: &WindowArgs) -> String {
    match (window.from.as_deref(), window.to.as_deref()) {
        (None, None) => "all time".to_string(),
        (Some(from), None) => from.to_string(),
        (None, Some(to)) => to.to_string(),
        (Some(from), Some(to)) => format!("{from} to {to}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.database_url.as_deref(), cli.max_connections, cli.utc_offset)?;
    let json = cli.json;
    let offset = config.utc_offset;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} tickets from {}.", csv.display());
        }
        Commands::Cohort { period, category } => {
            let period = parse_period(period.as_deref(), Period::current(offset))?;
            let store = PgStore::new(connect(&config).await?);
            let results =
                aggregator::compute_cohort(&store, period, offset, category.as_deref()).await?;
            emit(json, &results, |results| report::render_cohort(results))?;
        }
        Commands::SaveCohort { period, category } => {
            let period = parse_period(period.as_deref(), Period::current(offset).previous())?;
            let store = PgStore::new(connect(&config).await?);
            let stored =
                snapshot::save_cohort(&store, period, offset, category.as_deref()).await?;
            emit(json, &stored, |rows| report::render_snapshots(rows))?;
        }
        Commands::CohortHistory { window, category } => {
            let months = window.months()?;
            let store = PgStore::new(connect(&config).await?);
            let rows = snapshot::cohort_history(
                &store,
                category.as_deref(),
                months.map(|(from, _)| from),
                months.map(|(_, to)| to),
            )
            .await?;
            emit(json, &rows, |rows| report::render_snapshots(rows))?;
        }
        Commands::Status { window } => {
            let range = window.range(offset)?;
            let store = PgStore::new(connect(&config).await?);
            let stats = analytics::load_ticket_status(&store, range).await?;
            emit(json, &stats, |stats| report::render_status(stats))?;
        }
        Commands::Entities { window } => {
            let range = window.range(offset)?;
            let store = PgStore::new(connect(&config).await?);
            let stats = analytics::load_user_entities(&store, range).await?;
            emit(json, &stats, |stats| report::render_entities(stats))?;
        }
        Commands::SatisfactionTrend { window } => {
            let range = window.range(offset)?;
            let store = PgStore::new(connect(&config).await?);
            let points = analytics::load_satisfaction_trend(&store, range, offset).await?;
            emit(json, &points, |points| report::render_trend(points))?;
        }
        Commands::TopIssues { window, limit } => {
            let range = window.range(offset)?;
            let store = PgStore::new(connect(&config).await?);
            let issues = analytics::load_top_issues(&store, range, Some(limit)).await?;
            emit(json, &issues, |issues| report::render_top_issues(issues))?;
        }
        Commands::ResolutionTime { window } => {
            let range = window.range(offset)?;
            let store = PgStore::new(connect(&config).await?);
            let stats = analytics::load_resolution_time(&store, range).await?;
            emit(json, &stats, report::render_resolution)?;
        }
        Commands::ServiceTrends { window } => {
            let range = window.range(offset)?;
            let store = PgStore::new(connect(&config).await?);
            let points = analytics::load_service_trends(&store, range, offset).await?;
            emit(json, &points, |points| report::render_service_trends(points))?;
        }
        Commands::Questions { window, category } => {
            let range = window.range(offset)?;
            let store = PgStore::new(connect(&config).await?);
            let breakdown =
                analytics::load_question_breakdown(&store, range, category.as_deref()).await?;
            emit(json, &breakdown, |breakdown| report::render_questions(breakdown))?;
        }
        Commands::Dashboard { window, limit } => {
            let range = window.range(offset)?;
            let store = PgStore::new(connect(&config).await?);
            let summary = analytics::load_dashboard(&store, range, offset, limit).await?;
            emit(json, &summary, report::render_dashboard)?;
        }
        Commands::Report { window, out } => {
            let range = window.range(offset)?;
            let store = PgStore::new(connect(&config).await?);
            let summary =
                analytics::load_dashboard(&store, range, offset, analytics::DEFAULT_TOP_ISSUES)
                    .await?;
            let trends = analytics::load_service_trends(&store, range, offset).await?;
            let report = report::build_report(&window_label(&window), &summary, &trends);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
