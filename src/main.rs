//! Cache Ledger - Observable cache layer with tag propagation and audit trail.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cache_ledger::audit::AuditStore;
use cache_ledger::config::ConfigLoader;

#[derive(Parser)]
#[command(
    name = "cache-ledger",
    about = "Inspect and maintain the cache audit trail",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file (defaults to the standard search paths).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the audit database (overrides config).
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete audit records older than the retention window.
    Clean {
        /// Retention in days (defaults to the configured value).
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Show aggregate audit statistics.
    Stats,
    /// Show the most recent audit records.
    Recent {
        /// Number of records to show.
        #[arg(short, long, default_value_t = 20)]
        limit: u64,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let loader = match cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load()?;

    let db_path = cli
        .db
        .or_else(|| config.database.path.clone())
        .unwrap_or_else(cache_ledger::audit::default_audit_path);
    let store = AuditStore::open(&db_path).await?;

    match cli.command {
        Commands::Clean { days } => {
            let days = days.unwrap_or(config.retention_days);
            let removed = store.prune_older_than(days).await?;
            println!(
                "{} removed {} records older than {} days",
                "[CLEAN]".green().bold(),
                removed.to_string().cyan(),
                days
            );
        }
        Commands::Stats => {
            let stats = store.statistics().await?;
            println!("{} {}", "total records:".bold(), stats.total.cyan());
            println!("{} {}", "created today:".bold(), stats.today.cyan());
            for (operation, count) in &stats.operations {
                println!("  {operation}: {count}");
            }
        }
        Commands::Recent { limit } => {
            let records = store.recent(limit).await?;
            if records.is_empty() {
                println!("no audit records");
            }
            for record in &records {
                let location = match (&record.file_path, record.line_number) {
                    (Some(file), Some(line)) => format!("{file}:{line}"),
                    (Some(file), None) => file.clone(),
                    _ => "-".to_string(),
                };
                println!(
                    "{} {:<6} {} {} {}",
                    record.created_at.dimmed(),
                    record.operation.as_str().blue().bold(),
                    record.cache_key.cyan(),
                    record.tags.to_json().dimmed(),
                    location.dimmed()
                );
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
