use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygrade::config::Config;

mod commands;

use commands::{crawl, jobs, url, CrawlParams};

#[derive(Parser)]
#[command(
    name = "paygrade",
    version,
    about = "Salary data ingestion pipeline with freshness-gated scraping",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, compact, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape salary data for every company in the list
    Crawl {
        /// JSON array of company names
        #[arg(long)]
        companies: Option<PathBuf>,

        /// Source to scrape (repeatable); defaults to the configured sources
        #[arg(short, long = "source")]
        sources: Vec<String>,

        /// Skip pairs scraped successfully within this many hours
        #[arg(long)]
        threshold_hours: Option<u32>,

        /// Fetch timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// SQLite database path
        #[arg(long, conflicts_with = "dry_run")]
        database: Option<PathBuf>,

        /// Keep records in memory and write them to the output file only
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// JSON output path (always written in dry-run mode)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the URL a source resolves to for a company
    Url {
        /// Source tag (levels_fyi, weekday, ambitionbox)
        source: String,

        /// Company name
        company: String,
    },

    /// List recent scrape jobs
    Jobs {
        /// SQLite database path
        #[arg(long)]
        database: Option<PathBuf>,

        /// Only jobs for this company
        #[arg(long)]
        company: Option<String>,

        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    // Initialize tracing/logging
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    let outcome = match cli.command {
        Commands::Crawl {
            companies,
            sources,
            threshold_hours,
            timeout,
            database,
            dry_run,
            output,
        } => {
            tracing::info!(
                companies = ?companies,
                sources = ?sources,
                threshold_hours = ?threshold_hours,
                dry_run = %dry_run,
                "Starting crawl command"
            );
            let params = CrawlParams {
                companies,
                sources,
                threshold_hours,
                timeout,
                database,
                dry_run,
                output,
            };
            crawl(config, params).await
        }

        Commands::Url { source, company } => url(&source, &company),

        Commands::Jobs {
            database,
            company,
            limit,
        } => {
            let database = database.unwrap_or_else(|| config.database.sqlite_path.clone());
            jobs(&database, company.as_deref(), limit)
        }
    };

    if let Err(e) = outcome {
        let category = e.category();
        tracing::error!(category = %category, error = %e, "Command failed");
        eprintln!("Error [{category}]: {e}");
        eprintln!("Hint: {}", category.hint());
        std::process::exit(category.exit_code());
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    // RUST_LOG wins over the flag and the configured level
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => tracing_subscriber::EnvFilter::new("paygrade=debug,info"),
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!("paygrade={level},warn"))?,
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
