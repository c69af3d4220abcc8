//! feedpipe CLI
//!
//! Runs the discoverer and fetcher loops and offers a read-only view of the
//! stored collections.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use feedpipe::{
    config,
    error::{AppError, Result},
    models::Config,
    pipeline::{self, Services, runner},
    storage::{DocumentStore, PageRequest, Records, page},
};
use tokio_util::sync::CancellationToken;

/// feedpipe - marketplace listing sync
#[derive(Parser, Debug)]
#[command(name = "feedpipe", version, about = "Marketplace listing sync")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "feedpipe.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep the listing and enqueue items that need fetching
    Discover {
        /// Run a single sweep and exit
        #[arg(long)]
        once: bool,
    },

    /// Fetch details for queued items
    Fetch,

    /// Run discoverer and fetcher in one process
    Run,

    /// Resolve the exchange rate for a date
    Rate {
        /// Date as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Browse a collection page by page
    List {
        /// summaries, details or rates
        collection: String,

        #[arg(long)]
        page: Option<usize>,

        #[arg(long)]
        per_page: Option<usize>,
    },

    /// Show one record
    Show { collection: String, id: String },

    /// Validate configuration
    Validate,

    /// Show collection counts and queue depth
    Stats,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Token cancelled on Ctrl-C.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Shutdown requested, finishing in-flight work..."),
            Err(e) => log::error!("Cannot listen for Ctrl-C: {}", e),
        }
        trigger.cancel();
    });
    cancel
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Discover { once } => {
            let services = services(&cli.config).await?;
            let discoverer = services.discoverer();
            if once {
                let report = discoverer.sweep().await?;
                print_json(&report)?;
            } else {
                discoverer.run(shutdown_token()).await;
            }
        }

        Command::Fetch => {
            let services = services(&cli.config).await?;
            services.fetcher().run(shutdown_token()).await;
        }

        Command::Run => {
            let services = services(&cli.config).await?;
            pipeline::run_all(&services, shutdown_token()).await;
        }

        Command::Rate { date } => {
            let services = services(&cli.config).await?;
            let (date, rate) = runner::resolve_rate(&services, date).await?;
            println!("{} {} = {}", date, services.config.rates.currency_name, rate);
        }

        Command::List {
            collection,
            page: page_number,
            per_page,
        } => {
            let records = records(&cli.config)?;
            let collection = runner::collection(&collection)?;
            let request = PageRequest::new(page_number, per_page);
            let listing = page::browse(records.store().as_ref(), collection, request).await?;
            print_json(&listing)?;
        }

        Command::Show { collection, id } => {
            let records = records(&cli.config)?;
            let collection = runner::collection(&collection)?;
            match records.store().find(collection, &id).await? {
                Some(document) => print_json(&page::strip_hidden(document))?,
                None => {
                    return Err(AppError::validation(format!(
                        "no {collection} record with id '{id}'"
                    )));
                }
            }
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());
            let config = config::load_validated(&cli.config)?;
            log::info!(
                "Config OK (store: {:?}, queue: {:?})",
                config.store.backend,
                config.queue.backend
            );
        }

        Command::Stats => {
            let services = services(&cli.config).await?;
            print_json(&services.stats().await?)?;
        }
    }

    Ok(())
}

async fn services(path: &Path) -> Result<Services> {
    let config = config::load_config(path)?;
    log::info!("Loaded configuration from {}", path.display());
    if config.api.api_key.trim().is_empty() {
        log::warn!("No API key configured; set api.api_key or {}", config::ENV_API_KEY);
    }
    Services::from_config(config).await
}

/// Store access only; browsing needs no queue or HTTP client.
fn records(path: &Path) -> Result<Records> {
    let config: Config = config::load_config(path)?;
    Ok(Records::new(runner::build_store(&config.store)))
}
