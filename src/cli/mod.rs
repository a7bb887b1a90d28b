//! # CLI Module
//!
//! Command-line interface for replaying recorded task events.
//!
//! A script is a JSON array of batches in the backend wire format:
//! ```json
//! [
//!   [{"eventType": "scan-progress", "count": 3}],
//!   [{"eventType": "stored", "src": "/a.jpg", "dst": "/archive/a.jpg", "generated": false},
//!    {"eventType": "scan-complete", "count": 5}],
//!   [{"eventType": "completed"}]
//! ]
//! ```
//!
//! ## Usage
//! ```bash
//! # Play the script through the live tracker, 50ms between batches
//! archive-progress replay task.json --interval-ms 50
//!
//! # One snapshot per line
//! archive-progress replay task.json --output json
//!
//! # Fold the whole script and print the final snapshot
//! archive-progress fold task.json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_archive_client::config::ArchiveConfig;
use photo_archive_client::core::{
    apply_batch, OutcomeLabel, ProgressSnapshot, ProgressUpdate, TaskProgressDriver,
};
use photo_archive_client::error::{ArchiveClientError, Result};
use photo_archive_client::gateway::{ScriptedGateway, TaskGateway, TaskScript};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Source id the replayed task is attributed to
const REPLAY_SOURCE: &str = "replay";

/// Photo archive task progress tools
#[derive(Parser, Debug)]
#[command(name = "archive-progress")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded task through the progress tracker
    Replay {
        /// JSON file holding an array of event batches
        script: PathBuf,

        /// Pause between batches in milliseconds (defaults to the config value)
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Fold a recorded task without a subscription and print the result
    Fold {
        /// JSON file holding an array of event batches
        script: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Progress bar and summary table
    Pretty,
    /// One JSON snapshot per line
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    photo_archive_client::init_tracing();

    match cli.command {
        Commands::Replay {
            script,
            interval_ms,
            output,
            config,
        } => {
            let interval = match interval_ms {
                Some(ms) => Duration::from_millis(ms),
                None => load_config(config.as_deref())?.event_poll_interval(),
            };
            run_replay(&script, interval, output)
        }
        Commands::Fold { script } => run_fold(&script),
    }
}

fn load_config(path: Option<&Path>) -> Result<ArchiveConfig> {
    let config = match path {
        Some(path) => ArchiveConfig::load_or_initialize_at(path)?,
        None => ArchiveConfig::load_or_initialize()?,
    };
    Ok(config)
}

fn load_script(path: &Path) -> Result<TaskScript> {
    let content = std::fs::read_to_string(path).map_err(|e| ArchiveClientError::Script {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    TaskScript::from_json(&content).map_err(|e| ArchiveClientError::Script {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn run_replay(path: &Path, interval: Duration, output: OutputFormat) -> Result<()> {
    let script = load_script(path)?.with_interval(interval);
    let gateway = Arc::new(ScriptedGateway::with_registered_source(REPLAY_SOURCE, script));
    let driver = TaskProgressDriver::new(gateway.clone());

    let task_id = gateway.start_sync(REPLAY_SOURCE)?;
    let stream = driver.start(task_id)?;

    let term = Term::stdout();
    let bar = matches!(output, OutputFormat::Pretty).then(scanning_bar);

    for update in stream.iter() {
        match update {
            ProgressUpdate::Snapshot(snapshot) => match output {
                OutputFormat::Json => print_json(&snapshot),
                OutputFormat::Pretty => {
                    if let Some(ref bar) = bar {
                        update_bar(bar, &snapshot);
                    }
                }
            },
            ProgressUpdate::Failed { error, last } => {
                if let Some(ref bar) = bar {
                    bar.abandon_with_message(style("event stream failed").red().to_string());
                    print_summary(&term, &last);
                }
                return Err(error.into());
            }
        }
    }

    if let Some(ref bar) = bar {
        bar.finish_and_clear();
        let elapsed = chrono::Utc::now() - stream.started_at();
        term.write_line(&format!(
            "{} Task {} in {:.1}s",
            style("✓").green().bold(),
            stream.current().phase_name(),
            elapsed.num_milliseconds() as f64 / 1000.0
        ))
        .ok();
        print_summary(&term, &stream.current());
    }

    Ok(())
}

fn run_fold(path: &Path) -> Result<()> {
    let script = load_script(path)?;
    let snapshot = script
        .batches
        .iter()
        .fold(ProgressSnapshot::scanning(), |snapshot, batch| {
            apply_batch(&snapshot, batch)
        });

    let json = serde_json::to_string_pretty(&snapshot).map_err(|e| ArchiveClientError::Script {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    println!("{}", json);
    Ok(())
}

fn scanning_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn update_bar(bar: &ProgressBar, snapshot: &ProgressSnapshot) {
    if matches!(snapshot, ProgressSnapshot::Running(_)) && bar.length().is_none() {
        bar.set_length(snapshot.total());
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .map(|style| style.progress_chars("█▓░"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
    }
    bar.set_position(snapshot.processed());
    bar.set_message(format!(
        "{} {} processed, {} found",
        snapshot.phase_name(),
        snapshot.processed(),
        snapshot.total()
    ));
}

fn print_json(snapshot: &ProgressSnapshot) {
    if let Ok(line) = serde_json::to_string(snapshot) {
        println!("{}", line);
    }
}

fn print_summary(term: &Term, snapshot: &ProgressSnapshot) {
    term.write_line("").ok();
    term.write_line(&format!("{}", style("Stats:").bold().underlined()))
        .ok();

    for label in OutcomeLabel::ALL {
        let count = snapshot.count(label);
        let value = match label {
            OutcomeLabel::Errors if count > 0 => style(count).red(),
            _ => style(count).cyan(),
        };
        term.write_line(&format!("  {:<8} {}", label.to_string(), value))
            .ok();
    }

    term.write_line(&format!(
        "  {:<8} {} / {}",
        "Total",
        style(snapshot.processed()).bold(),
        snapshot.total()
    ))
    .ok();
}
