//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use jobdigest_core::{
    DedupStore, HarvestOutcome, Harvester, IngestReport, ProgressReporter, Stage,
};
use jobdigest_fetch::{FetchOptions, HttpFetcher};
use jobdigest_shared::{
    AppConfig, HarvestConfig, init_config, load_config, load_config_from,
};
use jobdigest_sources::JobSource;
use jobdigest_storage::{FileStore, KeyValueStore, OverlayStore};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// jobdigest: recent, unseen job postings as chat-sized digests.
#[derive(Parser)]
#[command(
    name = "jobdigest",
    version,
    about = "Harvest recent job postings and render unseen ones as paged messages.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.jobdigest/jobdigest.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Harvest once and print new postings as messages.
    Run {
        /// Room to harvest for (repeatable). Defaults to the configured rooms.
        #[arg(long)]
        room: Vec<String>,

        /// Source to harvest (repeatable). Defaults to all sources.
        #[arg(long)]
        source: Vec<String>,

        /// Compute and print messages without recording them as sent.
        #[arg(long)]
        dry_run: bool,
    },

    /// Harvest repeatedly until interrupted.
    Watch {
        /// Minutes between harvests. Defaults to the configured interval.
        #[arg(long)]
        every: Option<u64>,

        /// Room to harvest for (repeatable). Defaults to the configured rooms.
        #[arg(long)]
        room: Vec<String>,
    },

    /// List postings already sent to a room.
    Sent {
        /// Room to inspect.
        #[arg(long)]
        room: String,

        /// Source whose records to list.
        #[arg(long)]
        source: String,

        /// Show at most this many records, newest first.
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// List configured sources.
    Sources,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries
/// the rendered messages.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "jobdigest=info",
        1 => "jobdigest=debug",
        _ => "jobdigest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            room,
            source,
            dry_run,
        } => cmd_run(config_path, &room, &source, dry_run).await,
        Command::Watch { every, room } => cmd_watch(config_path, every, &room).await,
        Command::Sent {
            room,
            source,
            limit,
        } => cmd_sent(config_path, &room, &source, limit),
        Command::Sources => cmd_sources(config_path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Validated config narrowed to the requested rooms and sources.
fn harvest_config(
    path: Option<&Path>,
    rooms: &[String],
    sources: &[String],
) -> Result<HarvestConfig> {
    let mut app = app_config(path)?;

    if !rooms.is_empty() {
        app.rooms = rooms.to_vec();
    }
    if !sources.is_empty() {
        if let Some(unknown) = sources
            .iter()
            .find(|name| !app.sources.iter().any(|s| &s.name == *name))
        {
            return Err(eyre!("unknown source '{unknown}'"));
        }
        app.sources.retain(|s| sources.contains(&s.name));
    }

    Ok(HarvestConfig::try_from(&app)?)
}

// ---------------------------------------------------------------------------
// run / watch
// ---------------------------------------------------------------------------

async fn cmd_run(
    config_path: Option<&Path>,
    rooms: &[String],
    sources: &[String],
    dry_run: bool,
) -> Result<()> {
    let config = harvest_config(config_path, rooms, sources)?;
    let fetcher = HttpFetcher::new(&FetchOptions {
        timeout_secs: config.fetch_timeout_secs,
    })?;

    let outcomes = if dry_run {
        info!(data_dir = %config.data_dir.display(), "dry run, sent records will not be updated");
        let store = OverlayStore::new(FileStore::open_readonly(&config.data_dir));
        harvest_once(&config, fetcher, Arc::new(store)).await?
    } else {
        let store = FileStore::open(&config.data_dir)?;
        harvest_once(&config, fetcher, Arc::new(store)).await?
    };

    print_outcomes(&outcomes);

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        return Err(eyre!("{failed} of {} runs failed", outcomes.len()));
    }
    Ok(())
}

async fn harvest_once<S>(
    config: &HarvestConfig,
    fetcher: HttpFetcher,
    store: Arc<S>,
) -> Result<Vec<HarvestOutcome>>
where
    S: KeyValueStore + 'static,
{
    let harvester = Harvester::from_config(config, fetcher, store)?;
    let progress = Arc::new(CliProgress::new());
    let outcomes = harvester.harvest(&config.rooms, progress.clone()).await;
    progress.finish();
    Ok(outcomes)
}

async fn cmd_watch(config_path: Option<&Path>, every: Option<u64>, rooms: &[String]) -> Result<()> {
    let minutes = match every {
        Some(minutes) => minutes,
        None => app_config(config_path)?.defaults.watch_interval_minutes,
    };
    if minutes == 0 {
        return Err(eyre!("watch interval must be at least one minute"));
    }

    let config = harvest_config(config_path, rooms, &[])?;
    let fetcher = HttpFetcher::new(&FetchOptions {
        timeout_secs: config.fetch_timeout_secs,
    })?;
    let store = Arc::new(FileStore::open(&config.data_dir)?);
    let harvester = Harvester::from_config(&config, fetcher, store)?;

    info!(minutes, rooms = ?config.rooms, "watching sources");
    let (harvester, config) = (&harvester, &config);
    let round = move || async move {
        let progress = Arc::new(CliProgress::new());
        let outcomes = harvester.harvest(&config.rooms, progress.clone()).await;
        progress.finish();
        print_outcomes(&outcomes);

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        if failed > 0 {
            warn!(failed, "some runs failed, retrying next interval");
        }
    };

    let period = Duration::from_secs(minutes * 60);
    let rounds = run_until_shutdown(period, shutdown_signal(), round).await;
    info!(rounds, "interrupted, stopping");
    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Run `round` on every `period` tick until `shutdown` resolves, returning
/// the number of completed rounds. A round still running at shutdown is
/// dropped.
async fn run_until_shutdown<R, Fut>(
    period: Duration,
    shutdown: impl Future<Output = ()>,
    mut round: R,
) -> u64
where
    R: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut interval = tokio::time::interval(period);
    let mut completed = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => return completed,
        }
        tokio::select! {
            _ = round() => completed += 1,
            _ = &mut shutdown => return completed,
        }
    }
}

/// Messages to stdout; failures and undurable writes to stderr.
fn print_outcomes(outcomes: &[HarvestOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                for message in &report.messages {
                    println!("# {} · {}", report.room, report.source);
                    println!("{message}");
                }
                if let Some(e) = report.write.error() {
                    eprintln!(
                        "  warning: {} · {}: {} new postings not recorded as sent: {e}",
                        report.room,
                        report.source,
                        report.fresh.len()
                    );
                }
            }
            Err(e) => eprintln!("  error: {} · {}: {e}", outcome.room, outcome.source),
        }
    }
}

// ---------------------------------------------------------------------------
// sent / sources
// ---------------------------------------------------------------------------

fn cmd_sent(config_path: Option<&Path>, room: &str, source: &str, limit: usize) -> Result<()> {
    let config = HarvestConfig::try_from(&app_config(config_path)?)?;
    let source_config = config
        .source(source)
        .ok_or_else(|| eyre!("unknown source '{source}'"))?;
    let source = JobSource::from_config(source_config);

    let store = FileStore::open_readonly(&config.data_dir);
    let sent = DedupStore::new(store, source.sent_file.as_str()).load(room)?;

    if sent.is_empty() {
        println!("Nothing sent to '{room}' from '{}' yet.", source.name);
        return Ok(());
    }

    println!();
    println!("  {} records for {room} · {}", sent.len(), source.name);
    println!();
    for posting in sent.iter().take(limit) {
        let sent_at = posting
            .date_message_sent
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {sent_at}  {} | {} | {}",
            posting.company, posting.role, posting.date_posted
        );
    }
    if sent.len() > limit {
        println!("  … {} more", sent.len() - limit);
    }
    println!();
    Ok(())
}

fn cmd_sources(config_path: Option<&Path>) -> Result<()> {
    let config = app_config(config_path)?;
    println!();
    for source in &config.sources {
        println!("  {} ({})", source.name, source.kind);
        println!("    Header:    {}", source.job_type);
        println!("    URL:       {}", source.url);
        println!("    Sent file: {}", source.sent_file);
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, room: &str, source: &str, stage: Stage) {
        self.spinner.set_message(format!("{room} · {source}: {stage}"));
    }

    fn done(&self, report: &IngestReport) {
        self.spinner.set_message(format!(
            "{} · {}: {} new",
            report.room,
            report.source,
            report.fresh.len()
        ));
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
