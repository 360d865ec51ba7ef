//! seedwatch: follow analyses and import/export tasks on a SEED server.
//!
//! Usage:
//!     seedwatch watch                   # every analysis of the organization
//!     seedwatch watch --analysis 12     # just these
//!     seedwatch progress <KEY>          # one progress key, with a bar
//!     seedwatch start 12 --follow

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use seedwatch::{
    AnalysisBoard, HttpSeedClient, Notification, NotificationLevel, Notifier, ProgressClient,
    ProgressScale, ProgressState, ProgressTracker, SeedApi, SubTrack, TrackOutcome, WatchConfig,
};
use seedwatch_logging::{init_logging, LogConfig};
use seedwatch_protocol::{AnalysisId, ProgressKey};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// How often `watch` prints the progress of running analyses
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "seedwatch", about = "Follow long-running SEED server tasks")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.seedwatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API root, e.g. https://seed.example.org/api/v3/
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Organization the analyses belong to
    #[arg(long = "org", global = true)]
    organization_id: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow analyses until none has a running task
    Watch {
        /// Only follow these analyses (repeatable)
        #[arg(short, long = "analysis")]
        analyses: Vec<AnalysisId>,
    },

    /// Follow a single progress key
    Progress {
        key: String,

        /// Secondary key shown on its own bar
        #[arg(long)]
        sub: Option<String>,

        /// Where the main bar starts (0-100)
        #[arg(long, default_value_t = 0.0)]
        offset: f64,

        /// Scale applied to the reported progress
        #[arg(long, default_value_t = 1.0)]
        multiplier: f64,

        /// Poll interval override in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Start an analysis
    Start {
        id: AnalysisId,

        /// Keep following the analysis afterwards
        #[arg(long)]
        follow: bool,
    },

    /// Stop an analysis
    Stop {
        id: AnalysisId,

        /// Keep following the analysis afterwards
        #[arg(long)]
        follow: bool,
    },

    /// Delete an analysis
    Delete { id: AnalysisId },

    /// Show the resolved configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Prints action results for a human at a terminal.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Primary => println!("{}", notification.message),
            NotificationLevel::Error => eprintln!("{}", notification.message),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(LogConfig {
        app_name: "seedwatch",
        verbose: cli.verbose,
        quiet_console: matches!(cli.command, Commands::Progress { .. }),
        log_dir: None,
    })?;

    let mut config = WatchConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(organization_id) = cli.organization_id {
        config.organization_id = organization_id;
    }
    config.validate()?;

    match cli.command {
        Commands::Config { json } => show_config(&config, json),
        Commands::Watch { analyses } => {
            let board = board(&config)?;
            if analyses.is_empty() {
                board.load().await?;
            } else {
                board.load_ids(&analyses).await?;
            }
            follow(&board).await;
            Ok(())
        }
        Commands::Progress {
            key,
            sub,
            offset,
            multiplier,
            interval_ms,
        } => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.progress_poll_interval());
            track_key(
                &config,
                ProgressKey::new(key),
                sub.map(ProgressKey::new),
                ProgressScale::new(offset, multiplier),
                interval,
            )
            .await
        }
        Commands::Start { id, follow: keep } => {
            let board = board(&config)?;
            board.store().upsert(api(&config)?.get_analysis(id).await?);
            board.start(id).await?;
            if keep {
                follow(&board).await;
            }
            Ok(())
        }
        Commands::Stop { id, follow: keep } => {
            let board = board(&config)?;
            board.store().upsert(api(&config)?.get_analysis(id).await?);
            board.stop(id).await?;
            if keep {
                follow(&board).await;
            }
            Ok(())
        }
        Commands::Delete { id } => {
            let board = board(&config)?;
            board.store().upsert(api(&config)?.get_analysis(id).await?);
            board.delete(id).await?;
            Ok(())
        }
    }
}

fn api(config: &WatchConfig) -> Result<Arc<dyn SeedApi>> {
    let client = HttpSeedClient::from_config(config).context("Failed to build HTTP client")?;
    Ok(Arc::new(client))
}

fn board(config: &WatchConfig) -> Result<AnalysisBoard> {
    Ok(AnalysisBoard::new(
        api(config)?,
        Arc::new(ConsoleNotifier),
        config.analysis_poll_interval(),
    ))
}

/// Report progress until every analysis is idle or Ctrl-C, then tear down.
async fn follow(board: &AnalysisBoard) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(REPORT_INTERVAL);

    loop {
        tokio::select! {
            _ = board.registry().wait_idle() => {
                info!("No analysis has a running task");
                break;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick() => report(board),
        }
    }

    board.shutdown();
    for record in board.records() {
        println!(
            "{:>6}  {:<18} {}",
            record.id,
            record.status,
            record.name.as_deref().unwrap_or("")
        );
    }
}

fn report(board: &AnalysisBoard) {
    let registry = board.registry();
    for id in registry.tracked_ids() {
        if !registry.is_tracking(id) {
            continue;
        }
        if let Some(progress) = registry.progress(id) {
            let state = progress.borrow();
            println!(
                "{:>6}  {:>5.1}%  {}",
                id, state.progress, state.status_message
            );
        }
    }
}

async fn track_key(
    config: &WatchConfig,
    key: ProgressKey,
    sub_key: Option<ProgressKey>,
    scale: ProgressScale,
    interval: Duration,
) -> Result<()> {
    let tracker =
        ProgressTracker::new(ProgressClient::new(api(config)?), interval).with_scale(scale);
    let cancel = tracker.cancellation_token().clone();

    let bars = MultiProgress::new();
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")?;
    let main_bar = bars.add(ProgressBar::new(100).with_style(style.clone()));
    let (main_tx, main_rx) = watch::channel(ProgressState::default());
    let main_render = tokio::spawn(render(main_rx, main_bar.clone()));

    let (sub_tx, sub_rx) = watch::channel(ProgressState::default());
    let sub_bar = sub_key
        .as_ref()
        .map(|_| bars.add(ProgressBar::new(100).with_style(style)));
    let sub_render = sub_bar.clone().map(|bar| tokio::spawn(render(sub_rx, bar)));

    let sub_track = sub_key.as_ref().map(|key| SubTrack {
        key,
        scale: ProgressScale::IDENTITY,
        state: &sub_tx,
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let outcome = tokio::select! {
        outcome = tracker.track_main_sub(&key, &main_tx, sub_track) => outcome,
        _ = &mut ctrl_c => {
            cancel.cancel();
            TrackOutcome::Cancelled
        }
    };

    drop(main_tx);
    drop(sub_tx);
    let _ = main_render.await;
    if let Some(handle) = sub_render {
        let _ = handle.await;
    }
    if let Some(bar) = sub_bar {
        bar.finish();
    }

    match outcome {
        TrackOutcome::Done(snapshot) => {
            main_bar.finish_with_message(snapshot.status_message);
            Ok(())
        }
        TrackOutcome::Failed(err) => {
            main_bar.abandon_with_message("failed");
            bail!("Tracking {} failed: {}", key, err)
        }
        TrackOutcome::Cancelled => {
            main_bar.abandon_with_message("cancelled");
            Ok(())
        }
    }
}

async fn render(mut state: watch::Receiver<ProgressState>, bar: ProgressBar) {
    while state.changed().await.is_ok() {
        let current = state.borrow_and_update().clone();
        bar.set_position(current.progress.round() as u64);
        bar.set_message(current.status_message);
    }
}

fn show_config(config: &WatchConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
