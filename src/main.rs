//! Reel-Harvester main entry point
//!
//! This is the command-line interface for the Reel-Harvester acquisition pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use reel_harvester::api::{build_api_client, HttpSocialApi};
use reel_harvester::config::{load_config_with_hash, Config};
use reel_harvester::crawler::{AccountProcessor, CrawlPolicy, CrawlScheduler};
use reel_harvester::download::{
    build_media_client, AvatarFetcher, DownloadManager, DownloadSettings, HttpMediaSource,
};
use reel_harvester::ingest::ingest_file;
use reel_harvester::output::{load_statistics, print_statistics};
use reel_harvester::storage::{open_store, RunKind, RunStatus, SqliteStore};
use reel_harvester::StatusStore;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status used when the run is interrupted with Ctrl-C
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Reel-Harvester: a resumable social-media acquisition pipeline
///
/// Reel-Harvester crawls account profiles, short-video posts and follow
/// edges from a rate-limited API, downloads the selected media, and records
/// every outcome in a SQLite status store so interrupted runs resume cleanly.
#[derive(Parser, Debug)]
#[command(name = "reel-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resumable social-media acquisition pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl profiles, posts and follow edges of every pending account
    Crawl,

    /// Download the selected media of every account
    Download,

    /// Crawl, then download
    Run,

    /// Add accounts from a file with one handle or profile URL per line
    Ingest {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Clear an account's completion flags, selection and posts
    Reset {
        #[arg(value_name = "HANDLE")]
        handle: String,
    },

    /// Show statistics from the database
    Stats,
}

/// How a tracked run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Completed,
    Interrupted,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(Finish::Completed) => ExitCode::SUCCESS,
        Ok(Finish::Interrupted) => ExitCode::from(INTERRUPTED_EXIT_CODE),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("reel_harvester=info,warn"),
            1 => EnvFilter::new("reel_harvester=debug,info"),
            2 => EnvFilter::new("reel_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<Finish> {
    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let database_path = Path::new(&config.output.database_path);
    let mut store = open_store(database_path)
        .with_context(|| format!("failed to open {}", database_path.display()))?;

    match cli.command {
        Command::Ingest { file } => {
            let report = ingest_file(&mut store, &file)
                .with_context(|| format!("failed to ingest {}", file.display()))?;
            println!(
                "Read {} handles, inserted {} new accounts",
                report.read, report.inserted
            );
            Ok(Finish::Completed)
        }
        Command::Reset { handle } => {
            store.reset_account(&handle)?;
            tracing::info!("Reset account {}", handle);
            Ok(Finish::Completed)
        }
        Command::Stats => {
            println!("Database: {}\n", config.output.database_path);
            let stats = load_statistics(&store)?;
            print_statistics(&stats);
            Ok(Finish::Completed)
        }
        Command::Crawl => {
            let media = media_source(&config)?;
            handle_crawl(&config, &config_hash, &mut store, &media).await
        }
        Command::Download => {
            let media = media_source(&config)?;
            handle_download(&config, &config_hash, &mut store, &media).await
        }
        Command::Run => {
            let media = media_source(&config)?;
            match handle_crawl(&config, &config_hash, &mut store, &media).await? {
                Finish::Completed => {
                    handle_download(&config, &config_hash, &mut store, &media).await
                }
                Finish::Interrupted => Ok(Finish::Interrupted),
            }
        }
    }
}

fn media_source(config: &Config) -> anyhow::Result<HttpMediaSource> {
    let client = build_media_client(&config.download).context("failed to build media client")?;
    Ok(HttpMediaSource::new(client, config.download.chunk_size))
}

/// Handles the crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    store: &mut SqliteStore,
    media: &HttpMediaSource,
) -> anyhow::Result<Finish> {
    let token = config.api.resolve_token()?;
    let client = build_api_client(&config.api).context("failed to build API client")?;
    let api = HttpSocialApi::new(client, &config.api.base_url, token)?;

    let avatars = AvatarFetcher::new(
        media,
        config.download.avatar_dir.clone(),
        config.download.avatar_policy(),
    );
    let processor = AccountProcessor::new(
        &api,
        config.retry.to_policy(),
        CrawlPolicy::from_config(&config.policy),
        config.scheduler.page_delay(),
    )
    .with_avatars(avatars);
    let scheduler = CrawlScheduler::new(processor, config.scheduler.account_delay());

    let run_id = store.create_run(RunKind::Crawl, config_hash)?;
    tracing::info!("Starting crawl run {}", run_id);

    let outcome = tokio::select! {
        result = scheduler.run(store) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match record_outcome(store, run_id, outcome)? {
        Some(summary) => {
            tracing::info!(
                "Crawl run {} completed: {} accounts ({} not found, {} skipped, {} without posts)",
                run_id,
                summary.accounts_processed,
                summary.not_found,
                summary.skipped,
                summary.no_posts
            );
            Ok(Finish::Completed)
        }
        None => Ok(Finish::Interrupted),
    }
}

/// Handles the download operation
async fn handle_download(
    config: &Config,
    config_hash: &str,
    store: &mut SqliteStore,
    media: &HttpMediaSource,
) -> anyhow::Result<Finish> {
    let manager = DownloadManager::new(
        media,
        DownloadSettings::from_config(&config.download),
        config.download.transfer_policy(),
    );

    let run_id = store.create_run(RunKind::Download, config_hash)?;
    tracing::info!("Starting download run {}", run_id);

    let outcome = tokio::select! {
        result = manager.run(store) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match record_outcome(store, run_id, outcome)? {
        Some(summary) => {
            tracing::info!(
                "Download run {} completed: {} accounts, {} downloaded, {} already present, {} unavailable",
                run_id,
                summary.accounts,
                summary.totals.downloaded,
                summary.totals.already_present,
                summary.totals.unavailable
            );
            Ok(Finish::Completed)
        }
        None => Ok(Finish::Interrupted),
    }
}

/// Records the terminal status of a run and unwraps its result
///
/// `None` means the work was interrupted with Ctrl-C.
fn record_outcome<T>(
    store: &mut SqliteStore,
    run_id: i64,
    outcome: Option<reel_harvester::Result<T>>,
) -> anyhow::Result<Option<T>> {
    let status = RunStatus::from_outcome(outcome.as_ref());
    store.finish_run(run_id, status)?;

    match outcome {
        None => {
            tracing::warn!("Interrupted, run {} marked {}", run_id, status.to_db_string());
            Ok(None)
        }
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(e)) => {
            if e.is_fatal() {
                tracing::error!("Fatal error, run {} aborted", run_id);
            }
            Err(anyhow::Error::new(e).context(format!("run {} failed", run_id)))
        }
    }
}
