use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use yapscope::cache::{CacheStore, FileCacheStore};
use yapscope::cli::{CacheCommands, Cli, Commands, ConfigCommands};
use yapscope::clock::{Clock, SystemClock};
use yapscope::config::Config;
use yapscope::display::{
    display_cache_status, display_config, display_error, display_lookup, display_publish_check,
    display_snapshot, display_verify,
};
use yapscope::gateway::GatewayFetcher;
use yapscope::publish::{record_update_needed, AttestationExport};
use yapscope::refresh::RefreshOrchestrator;
use yapscope::resolver::NameRecordResolver;
use yapscope::service::{serve_lines, stdin_lines, RefreshScheduler, ScoreService};
use yapscope::snapshot::ScoreIndex;

/// Wait before the second gateway sweep in `verify`; later sweeps wait longer
const VERIFY_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Pending requests the serve loop buffers
const SERVICE_BUFFER: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    let result = run(cli).await;

    if let Err(e) = &result {
        display_error(&e.to_string());
        std::process::exit(1);
    }

    Ok(())
}

/// Logs go to stderr so `serve` keeps stdout for responses
fn init_tracing(cli: &Cli) {
    let default_filter = match (&cli.command, cli.verbose) {
        (_, true) => "yapscope=debug",
        (Commands::Serve, false) => "yapscope=info",
        _ => "yapscope=warn",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Scores { force } => cmd_scores(&cli, *force).await,
        Commands::Lookup { username } => cmd_lookup(&cli, username).await,
        Commands::Status => cmd_status(&cli).await,
        Commands::Verify { attempts } => cmd_verify(&cli, *attempts).await,
        Commands::Serve => cmd_serve(&cli).await,
        Commands::PublishCheck { file, cid } => cmd_publish_check(&cli, file, cid).await,
        Commands::Cache { action } => cmd_cache(action.clone()).await,
        Commands::Config { action } => cmd_config(action.clone()),
    }
}

// ============================================================================
// Command handlers
// ============================================================================

/// Handle `scores` command - refresh if needed and summarize
async fn cmd_scores(cli: &Cli, force: bool) -> Result<()> {
    let orchestrator = RefreshOrchestrator::from_config(&load_config(cli)?)?;
    let report = orchestrator.refresh(force).await;
    display_snapshot(&report);
    Ok(())
}

/// Handle `lookup` command - one user's points
async fn cmd_lookup(cli: &Cli, username: &str) -> Result<()> {
    let orchestrator = RefreshOrchestrator::from_config(&load_config(cli)?)?;
    let report = orchestrator.refresh(false).await;

    let index = ScoreIndex::from_snapshot(&report.snapshot);
    display_lookup(username, index.get(username), report.outcome);
    Ok(())
}

/// Handle `status` command - cache age without touching the network
async fn cmd_status(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let store = FileCacheStore::in_config_dir()?;
    let entry = store.read().await;

    display_cache_status(
        entry.as_ref(),
        SystemClock.now_ms(),
        config.freshness_window(),
        store.path(),
    );
    Ok(())
}

/// Handle `verify` command - download what is published, leave the cache alone
async fn cmd_verify(cli: &Cli, attempts: u32) -> Result<()> {
    let config = load_config(cli)?;
    let resolver = NameRecordResolver::from_config(&config)?;
    let fetcher = GatewayFetcher::from_config(&config)?;

    let content_id = resolver
        .resolve_content_id(&config.name_record.name, &config.name_record.key)
        .await?;
    let snapshot = fetcher
        .fetch_with_retries(&content_id, attempts, VERIFY_RETRY_DELAY)
        .await?;

    display_verify(&config.name_record.name, &content_id, &snapshot);
    Ok(())
}

/// Handle `serve` command - scheduled refresh plus JSON requests on stdin
async fn cmd_serve(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let orchestrator = Arc::new(RefreshOrchestrator::from_config(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler =
        RefreshScheduler::new(orchestrator.clone(), config.refresh_interval()).spawn(shutdown_rx);
    let (handle, service) = ScoreService::new(orchestrator).spawn(SERVICE_BUFFER);

    let lines = stdin_lines(SERVICE_BUFFER)?;
    let served = tokio::select! {
        result = serve_lines(&handle, lines, tokio::io::stdout()) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    // Stop the scheduler and let the service loop drain
    let _ = shutdown_tx.send(true);
    drop(handle);
    scheduler.await?;
    service.await?;

    served.map_err(Into::into)
}

/// Handle `publish-check` command - validate an export and apply the skip rule
async fn cmd_publish_check(cli: &Cli, file: &Path, content_id: &str) -> Result<()> {
    let config = load_config(cli)?;

    let export = AttestationExport::load(file)?;
    export.validate()?;
    let snapshot = export.into_snapshot();

    let resolver = NameRecordResolver::from_config(&config)?;
    let current = resolver
        .current_record(&config.name_record.name, &config.name_record.key)
        .await?;
    let update_needed = record_update_needed(current.as_deref(), content_id);

    display_publish_check(
        file,
        snapshot.len(),
        snapshot.timestamp,
        current.as_deref(),
        content_id,
        update_needed,
    );
    Ok(())
}

/// Handle `cache` subcommands
async fn cmd_cache(action: CacheCommands) -> Result<()> {
    match action {
        CacheCommands::Clear => {
            let store = FileCacheStore::in_config_dir()?;
            store.clear().await?;
            println!("Cleared {}", store.path().display());
            Ok(())
        }
    }
}

/// Handle `config` subcommands
fn cmd_config(action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let config = Config::load()?;
            display_config(&config, &Config::file_path()?, Config::exists());
            Ok(())
        }
        ConfigCommands::Set {
            rpc_url,
            gateways,
            ens_name,
            record_key,
        } => {
            if rpc_url.is_none() && gateways.is_empty() && ens_name.is_none() && record_key.is_none() {
                println!("No value provided to set.");
                println!("Usage: yapscope config set [--rpc-url <URL>] [--gateway <URL>]... [--ens-name <NAME>] [--record-key <KEY>]");
                return Ok(());
            }

            // Load existing config or defaults
            let mut config = Config::load()?;

            if let Some(url) = rpc_url {
                config.rpc_url = url;
            }
            if !gateways.is_empty() {
                config.gateways = gateways;
            }
            if let Some(name) = ens_name {
                config.name_record.name = name;
            }
            if let Some(key) = record_key {
                config.name_record.key = key;
            }

            // Validate before saving
            config.validate()?;
            config.save()?;

            println!("Saved configuration to {}", Config::file_path()?.display());
            Ok(())
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Load config and apply the --rpc-url override
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;

    if let Some(url) = &cli.rpc_url {
        config.rpc_url = url.clone();
    }

    config
        .validate()
        .map_err(|e| anyhow!("{} (run `yapscope config show` to inspect)", e))?;
    Ok(config)
}
