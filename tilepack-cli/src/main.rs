//! Tilepack CLI - mirror map tiles for offline use.
//!
//! Plans the tile set for the configured regions, asks for confirmation,
//! then drives the library's download job while rendering progress events.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tilepack::config::{self, DownloadConfig};
use tilepack::job::{DownloadJob, RunOutcome, RunPlan, StartGate};
use tilepack::progress::{ProgressEvent, RunSummary};

#[derive(Parser, Debug)]
#[command(
    name = "tilepack",
    version,
    about = "Download map tiles covering configured regions for offline use"
)]
struct Cli {
    /// Region definitions as a JSON array; the built-in set is used if omitted
    #[arg(long, value_name = "FILE")]
    regions: Option<PathBuf>,

    /// Tile server URL template with {z}, {x}, {y} placeholders
    #[arg(long, default_value = config::DEFAULT_SERVER_TEMPLATE)]
    server: String,

    /// Output directory for tile artifacts
    #[arg(long, short, default_value = config::DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Lowest zoom level to mirror
    #[arg(long, default_value_t = config::DEFAULT_ZOOM)]
    min_zoom: u8,

    /// Highest zoom level to mirror (inclusive)
    #[arg(long, default_value_t = config::DEFAULT_ZOOM)]
    max_zoom: u8,

    /// Concurrent downloads
    #[arg(long, default_value_t = 3)]
    concurrency: usize,

    /// Delay in milliseconds between tiles handed to the pool
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// Attempts per tile before giving up
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Answer yes to the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,

    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<(DownloadConfig, bool), tilepack::job::JobError> {
        let regions = match &self.regions {
            Some(path) => config::load_regions(path)?,
            None => config::default_regions(),
        };

        let mut download = DownloadConfig::default()
            .with_regions(regions)
            .with_zoom_range(self.min_zoom, self.max_zoom)
            .with_output_dir(self.output);
        download.server_template = self.server;
        download.concurrency = self.concurrency;
        download.submission_delay = Duration::from_millis(self.delay_ms);
        download.max_attempts = self.max_attempts;

        Ok((download, self.yes))
    }
}

/// Interactive confirmation gate: shows the per-region breakdown, then asks.
struct PromptGate {
    assume_yes: bool,
}

impl StartGate for PromptGate {
    fn confirm(&self, plan: &RunPlan) -> bool {
        for entry in &plan.entries {
            println!(
                "  {} {} (zoom {}): {} tiles",
                style("•").cyan(),
                entry.region,
                entry.zoom,
                entry.tile_count
            );
        }
        println!(
            "\n{} {} tiles to process",
            style("Total:").bold(),
            style(plan.total_tiles()).bold().green()
        );

        if self.assume_yes {
            return true;
        }

        Confirm::new()
            .with_prompt("Continue?")
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Renders progress events as a terminal bar until the run finishes.
async fn render_progress(mut events: mpsc::Receiver<ProgressEvent>) {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg} [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Snapshot(snapshot) => {
                bar.set_length(snapshot.total as u64);
                bar.set_position(snapshot.completed as u64);
                bar.set_message(format!(
                    "down {} | skip {} | fail {}",
                    snapshot.tally.downloaded,
                    snapshot.tally.skipped_or_missing(),
                    snapshot.tally.failed
                ));
            }
            ProgressEvent::Finished(_) => break,
        }
    }

    bar.finish_and_clear();
}

fn print_summary(summary: &RunSummary, output: &std::path::Path) {
    println!();
    if summary.cancelled {
        println!(
            "{} interrupted after {} of {} tiles",
            style("!").yellow().bold(),
            summary.completed,
            summary.total_planned
        );
    } else {
        println!("{} run complete", style("✓").green().bold());
    }
    println!("  Downloaded: {}", summary.tally.downloaded);
    println!("  Skipped:    {}", summary.tally.skipped_or_missing());
    println!("  Failed:     {}", summary.tally.failed);
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    println!("  Tiles in:   {}", output.display());
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tilepack::telemetry::init(if cli.verbose {
        "tilepack=debug"
    } else {
        "tilepack=warn"
    });

    let (download, assume_yes) = match cli.into_config() {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", style("tilepack - offline tile mirror").bold());
    println!("  Server: {}", download.server_template);
    println!(
        "  Zoom:   {}..={}",
        download.min_zoom, download.max_zoom
    );
    println!("  Output: {}", download.output_dir.display());
    println!(
        "  Workers: {} ({}ms between submissions)\n",
        download.concurrency,
        download.submission_delay.as_millis()
    );

    let output_dir = download.output_dir.clone();
    let job = match DownloadJob::new(download) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    // Ctrl-C stops submission; in-flight downloads drain before the summary.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\ninterrupt received, finishing in-flight tiles...");
        interrupt.cancel();
    }) {
        debug!(error = %e, "could not install Ctrl-C handler");
    }

    let (event_tx, event_rx) = mpsc::channel(64);
    let renderer = tokio::spawn(render_progress(event_rx));

    let gate = PromptGate { assume_yes };
    let result = job.execute(&gate, Some(event_tx), cancel).await;
    let _ = renderer.await;

    match result {
        Ok(RunOutcome::Completed(summary)) => {
            print_summary(&summary, &output_dir);
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Declined) => {
            println!("{}", style("Aborted.").yellow());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
