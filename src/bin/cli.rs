//! Board Watcher CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use board_watcher::{
    error::Result,
    models::{Config, KeywordFilter},
    pipeline::{self, Collaborators},
    services::{BoardParser, Credentials, HttpFetcher, LineNotifier, LogNotifier, Notifier},
    storage::{LocalStorage, SeenCache},
    utils::http,
};
use clap::{Parser, Subcommand};

/// Board Watcher - keyword alerts for a board listing
#[derive(Parser, Debug)]
#[command(
    name = "board-watcher",
    version,
    about = "Watches a board listing for new keyword-matching posts"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Dotenv file consulted for credentials missing from the environment
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk the board once for every configured keyword group
    Run {
        /// Log notifications instead of sending them (no credentials needed)
        #[arg(long)]
        dry_run: bool,

        /// Override board.name
        #[arg(long)]
        board: Option<String>,

        /// Override board.max_pages
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Validate the configuration file
    Validate,

    /// Show cache and result files for the board
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Build the notifier and recipient, failing before any crawling when
/// credentials are missing.
fn build_notifier(
    config: &Config,
    env_file: &Path,
    dry_run: bool,
) -> Result<(Arc<dyn Notifier>, String)> {
    if dry_run {
        return Ok((Arc::new(LogNotifier), "dry-run".to_string()));
    }

    let credentials = Credentials::from_env_or_file(&config.notify, env_file)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.crawler.timeout_secs))
        .build()?;
    let notifier = LineNotifier::new(client, &config.notify.endpoint, credentials.token);
    Ok((Arc::new(notifier), credentials.recipient))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // A crawl never runs on fallback defaults: they match every post.
    let mut config = match cli.command {
        Command::Run { .. } => Config::load(&cli.config).map_err(|e| {
            log::error!("Config load failed from {}: {}", cli.config.display(), e);
            e
        })?,
        _ => Config::load_or_default(&cli.config),
    };
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run {
            dry_run,
            board,
            max_pages,
        } => {
            if let Some(board) = board {
                config.board.name = board;
            }
            if let Some(max_pages) = max_pages {
                config.board.max_pages = max_pages;
            }
            config.validate()?;

            let (notifier, recipient) = build_notifier(&config, &cli.env_file, dry_run)
                .map_err(|e| {
                    log::error!("Notification credentials missing: {}", e);
                    e
                })?;

            let client = http::create_client(&config.crawler)?;
            let deps = Collaborators {
                fetcher: Arc::new(HttpFetcher::new(client)),
                parser: Arc::new(BoardParser::new(&config.parser, &config.board.base_url)?),
                notifier,
                storage: Arc::new(LocalStorage::new(config.board_dir())),
                recipient,
            };

            let outcomes = pipeline::run_watch(&config, &deps).await;

            for outcome in &outcomes {
                match &outcome.result {
                    Ok(report) => log::info!(
                        "✓ {}: {} pages, {} checked, {} new ({})",
                        outcome.name,
                        report.pages,
                        report.checked,
                        report.new,
                        report.stop
                    ),
                    Err(e) => log::error!("✗ {}: {}", outcome.name, e),
                }
            }

            if let Some(error) = outcomes.into_iter().find_map(|o| o.result.err()) {
                return Err(error);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
            log::info!("  Board: {} ({})", config.board.name, config.board.start_url());
            log::info!("  Max pages: {}", config.board.max_pages);
            for (name, groups) in config.filter.session_groups() {
                log::info!(
                    "  Session '{}': keywords {}",
                    name,
                    KeywordFilter::new(&groups).signature()
                );
            }

            match Credentials::from_env_or_file(&config.notify, &cli.env_file) {
                Ok(_) => log::info!("✓ Notification credentials found"),
                Err(e) => log::warn!("Notification credentials missing: {}", e),
            }
        }

        Command::Info => {
            let storage = LocalStorage::new(config.board_dir());
            log::info!("Board directory: {}", storage.root_dir().display());

            let cache = SeenCache::load(&storage).await;
            log::info!("Cached entries: {}", cache.len());

            let files = storage.list_result_files().await?;
            if files.is_empty() {
                log::info!("No result files yet.");
            }
            for file in files {
                log::info!("Result file: {}", file.display());
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
