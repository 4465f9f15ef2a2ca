//! killboard-relay - player-kill journal relay
//!
//! Submits player deaths and player kills from the game journal to a
//! killboard service.
//!
//! # Usage
//!
//! ```bash
//! # Live mode, journal events piped on stdin
//! tail -f Journal.2024-01-01T120000.01.log | killboard-relay
//!
//! # Follow a journal file directly
//! killboard-relay run --journal Journal.2024-01-01T120000.01.log --follow
//!
//! # Replay the journal directory and submit in one request
//! killboard-relay historic --since 2024-01-01T00:00:00Z
//!
//! # Check the configured API key
//! killboard-relay check-key
//! ```
//!
//! # Environment Variables
//!
//! - `KILLBOARD_CONFIG`: Path to the settings file (default: `./killboard.toml`)
//! - `KILLBOARD_API_KEY`: API key, overrides `[api] key`
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use killboard_relay::config::defaults::NOTIFY_DURATION;
use killboard_relay::delivery::{DispatchOutcome, Transport};
use killboard_relay::historic::scan;
use killboard_relay::live::run_live;
use killboard_relay::types::BulkPayload;
use killboard_relay::{
    BulkSubmitter, DeliveryQueue, DeliveryWorker, HistoricRun, JsonLinesSource, LiveTracker,
    Notification, Notifier, ReqwestTransport, ScanOptions, SettingsStore, TokioClock,
    TracingNotifier,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "killboard-relay")]
#[command(about = "Relay player kills from the game journal to a killboard")]
#[command(version)]
struct CliArgs {
    /// Settings file (overrides KILLBOARD_CONFIG and ./killboard.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Submit kills from live journal events (default)
    Run(RunArgs),

    /// Scan the journal directory and submit every kill found
    Historic(HistoricArgs),

    /// Verify the configured API key against the killboard
    CheckKey,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Journal file to read instead of stdin
    #[arg(long, value_name = "FILE")]
    journal: Option<PathBuf>,

    /// Keep reading as the game appends to the journal
    #[arg(long, requires = "journal")]
    follow: bool,
}

#[derive(Args, Debug)]
struct HistoricArgs {
    /// Only files modified at or after this time (unix seconds or RFC 3339)
    #[arg(long, value_parser = parse_time_bound)]
    since: Option<i64>,

    /// Only files modified at or before this time (unix seconds or RFC 3339)
    #[arg(long, value_parser = parse_time_bound)]
    until: Option<i64>,

    /// Print the bulk payload instead of submitting it
    #[arg(long)]
    dry_run: bool,
}

fn parse_time_bound(value: &str) -> Result<i64, String> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Ok(secs);
    }
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .map_err(|e| format!("expected unix seconds or an RFC 3339 timestamp: {e}"))
}

// ============================================================================
// Composition Root
// ============================================================================

/// Process-wide collaborators, built once in `main`.
struct Services {
    settings: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
    transport: Arc<dyn Transport>,
}

impl Services {
    fn build(config: Option<PathBuf>) -> Result<Self> {
        let settings = match config {
            Some(path) => SettingsStore::open(&path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => SettingsStore::load(),
        };
        let transport = ReqwestTransport::new().context("Failed to build HTTP client")?;

        Ok(Self {
            settings: Arc::new(settings),
            notifier: Arc::new(TracingNotifier),
            transport: Arc::new(transport),
        })
    }

    fn delivery_queue(&self) -> (DeliveryQueue, DeliveryWorker) {
        DeliveryQueue::new(
            Arc::clone(&self.settings),
            Arc::clone(&self.transport),
            Arc::clone(&self.notifier),
            Arc::new(TokioClock),
        )
    }

    fn historic_run(&self, options: ScanOptions) -> HistoricRun {
        let bulk = BulkSubmitter::new(Arc::clone(&self.transport), Arc::clone(&self.settings));
        HistoricRun::new(options, bulk, Arc::clone(&self.notifier))
    }

    /// Completion callback for historic runs: never run twice automatically,
    /// whatever the outcome.
    fn disable_historic_on_complete(&self) -> impl FnOnce(bool) + Send + 'static {
        let settings = Arc::clone(&self.settings);
        move |success| {
            info!(success, "[Historic] Run complete");
            if let Err(e) = settings.disable_historic_run() {
                warn!(error = %e, "[Historic] Could not clear run_on_next_startup");
            }
        }
    }

    fn missing_api_key(&self) -> bool {
        if self.settings.api_key().is_some() {
            return false;
        }
        self.notifier.notify(Notification::error(
            "No killboard API key configured. Add one to your settings.",
            NOTIFY_DURATION,
        ));
        true
    }
}

// ============================================================================
// Subcommands
// ============================================================================

async fn cmd_run(args: RunArgs, services: Services, cancel_token: CancellationToken) -> Result<()> {
    let (queue, worker) = services.delivery_queue();
    let _delivery_task = worker.spawn();

    if !services.missing_api_key() {
        queue.check_credentials().context("Failed to queue credential check")?;
    }

    let historic: Option<JoinHandle<bool>> = if services.settings.run_historic_on_next_startup() {
        info!("[Historic] Run requested for this startup");
        let options = ScanOptions::new(services.settings.journal_dir())
            .with_filter(services.settings.commander_filter());
        Some(
            services
                .historic_run(options)
                .spawn(services.disable_historic_on_complete()),
        )
    } else {
        None
    };

    let mut tracker = LiveTracker::new(
        services.settings.commander_filter(),
        queue.clone(),
        Arc::clone(&services.notifier),
    );
    let stats = match args.journal {
        Some(path) => {
            info!("📥 Input: journal file {}", path.display());
            let mut source = JsonLinesSource::open(&path, args.follow).await?;
            run_live(&mut source, &mut tracker, cancel_token.clone()).await?
        }
        None => {
            info!("📥 Input: stdin (JSON journal events)");
            let mut source = JsonLinesSource::stdin();
            run_live(&mut source, &mut tracker, cancel_token.clone()).await?
        }
    };
    info!(
        events = stats.events,
        submitted = stats.submitted,
        failed = stats.failed,
        commander = tracker.session().commander().unwrap_or("unknown"),
        "[Live] Input finished"
    );

    if queue.pending() > 0 && !cancel_token.is_cancelled() {
        info!("Waiting for {} pending deliveries (Ctrl+C to abort)", queue.pending());
        tokio::select! {
            _ = queue.wait_idle() => {}
            _ = cancel_token.cancelled() => warn!("{} deliveries dropped on shutdown", queue.pending()),
        }
    }

    if let Some(handle) = historic {
        tokio::select! {
            result = handle => {
                if let Err(e) = result {
                    warn!(error = %e, "[Historic] Task failed");
                }
            }
            _ = cancel_token.cancelled() => warn!("[Historic] Abandoned on shutdown"),
        }
    }
    Ok(())
}

async fn cmd_historic(args: HistoricArgs, services: Services) -> Result<()> {
    let options = ScanOptions::new(services.settings.journal_dir())
        .with_filter(services.settings.commander_filter())
        .with_bounds(args.since, args.until);

    if args.dry_run {
        let scan_options = options.clone();
        let result = tokio::task::spawn_blocking(move || scan(&scan_options, |_, _| {}))
            .await
            .context("Historic scan task failed")?;
        info!(
            records = result.len(),
            deaths = result.deaths.len(),
            kills = result.kills.len(),
            "[Historic] Dry run"
        );
        let payload = BulkPayload::from_records(
            &result.into_records(),
            services.settings.payload_schema(),
            services.settings.send_location(),
        );
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if services.missing_api_key() {
        bail!("Historic submission needs an API key");
    }
    let on_complete = services.disable_historic_on_complete();
    if !services.historic_run(options).run(on_complete).await {
        bail!("Historic submission failed");
    }
    Ok(())
}

async fn cmd_check_key(services: Services, cancel_token: CancellationToken) -> Result<()> {
    if services.missing_api_key() {
        bail!("No API key configured");
    }
    let (queue, mut worker) = services.delivery_queue();
    queue.check_credentials().context("Failed to queue credential check")?;

    loop {
        let outcome = tokio::select! {
            outcome = worker.process_one() => outcome,
            _ = cancel_token.cancelled() => bail!("Credential check interrupted"),
        };
        match outcome {
            Some(DispatchOutcome::Delivered) => return Ok(()),
            Some(DispatchOutcome::RateLimited) => continue,
            Some(other) => bail!("Credential check failed ({other:?})"),
            None => bail!("Delivery queue closed"),
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    info!("killboard-relay v{}", env!("CARGO_PKG_VERSION"));
    let services = Services::build(args.config)?;
    info!(
        base_url = %services.settings.base_url(),
        journal_dir = %services.settings.journal_dir().display(),
        "Settings ready"
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    match args.command.unwrap_or(SubCommand::Run(RunArgs::default())) {
        SubCommand::Run(run_args) => cmd_run(run_args, services, cancel_token).await?,
        SubCommand::Historic(historic_args) => cmd_historic(historic_args, services).await?,
        SubCommand::CheckKey => cmd_check_key(services, cancel_token).await?,
    }

    info!("✓ killboard-relay shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_bounds_accept_unix_and_rfc3339() {
        assert_eq!(parse_time_bound("1584017394"), Ok(1_584_017_394));
        assert_eq!(parse_time_bound("2020-03-12T12:49:54Z"), Ok(1_584_017_394));
        assert_eq!(parse_time_bound("2020-03-12T14:49:54+02:00"), Ok(1_584_017_394));
        assert!(parse_time_bound("yesterday").is_err());
    }

    #[test]
    fn cli_defaults_to_run() {
        let args = CliArgs::try_parse_from(["killboard-relay"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn follow_requires_journal() {
        assert!(CliArgs::try_parse_from(["killboard-relay", "run", "--follow"]).is_err());
        let args =
            CliArgs::try_parse_from(["killboard-relay", "run", "--journal", "j.log", "--follow"]).unwrap();
        assert!(matches!(args.command, Some(SubCommand::Run(RunArgs { follow: true, .. }))));
    }
}
