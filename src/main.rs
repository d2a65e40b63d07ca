//! # tdt CLI
//!
//! Replays recorded streams through the topic detection engine and checks
//! configuration files.
//!
//! ## Usage
//!
//! ```bash
//! tdt --config ./config/tdt.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tdt replay <file>` | Replay a JSONL recording and print the timeline |
//! | `tdt check-config` | Validate the configuration file |
//!
//! ## Examples
//!
//! ```bash
//! # Replay as fast as possible, live topic reports on stderr
//! tdt replay match.jsonl --report human
//!
//! # Replay at 60x real time, timeline as JSON
//! tdt replay match.jsonl --speed 60 --json
//!
//! # More logging
//! tdt -vv replay match.jsonl
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tdt_stream::config::{self, Config};
use tdt_stream::consumer::RunLimits;
use tdt_stream::logging;
use tdt_stream::replay::{self, ReplayOptions};
use tdt_stream::report::ReportMode;
use tracing::info;

/// Streaming topic detection and tracking.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tdt.example.toml` for every option.
#[derive(Parser)]
#[command(
    name = "tdt",
    about = "Streaming topic detection and tracking over short social-media posts",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/tdt.toml`. When the default file does not
    /// exist, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

const DEFAULT_CONFIG: &str = "./config/tdt.toml";

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded stream.
    ///
    /// Reads one JSON item per line, feeds the items to a consumer running
    /// on stream time, and prints the resulting timeline to stdout.
    Replay {
        /// JSONL recording.
        file: PathBuf,

        /// Stream seconds per wall-clock second; 0 replays as fast as possible.
        #[arg(long, default_value_t = 0.0)]
        speed: f64,

        /// Print the run summary and timeline as JSON.
        #[arg(long)]
        json: bool,

        /// Override `consumer.max_inactivity` (seconds; negative waits forever).
        #[arg(long)]
        max_inactivity: Option<i64>,

        /// Live topic reports on stderr. Defaults to `human` on a terminal.
        #[arg(long, value_enum)]
        report: Option<ReportMode>,
    },

    /// Validate the configuration file and print the effective settings.
    CheckConfig,
}

fn resolve_config(path: &Path) -> Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        info!("no config file, using defaults");
        return Ok(Config::default());
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut cfg = resolve_config(&cli.config)?;

    match cli.command {
        Commands::Replay {
            file,
            speed,
            json,
            max_inactivity,
            report,
        } => {
            if let Some(seconds) = max_inactivity {
                cfg.consumer.max_inactivity = seconds;
            }
            let options = ReplayOptions {
                speed,
                limits: RunLimits {
                    initial_wait: cfg.consumer.initial_wait(),
                    max_time: cfg.consumer.max_time(),
                    max_inactivity: cfg.consumer.max_inactivity(),
                },
                report: report.unwrap_or_else(ReportMode::default_for_tty),
            };
            replay::run_replay(&cfg, &file, options, json).await?;
        }
        Commands::CheckConfig => {
            let n = &cfg.nutrition;
            let d = &cfg.detection;
            println!("Configuration OK.");
            println!(
                "  windows:   {} x {}s, {} retained (horizon {}s)",
                n.windows,
                n.window_size,
                n.sets,
                cfg.retention()
            );
            println!(
                "  detection: {:?}, burst {}..{}, min volume {}",
                d.strategy, d.burst_end, d.burst_start, d.min_volume
            );
            println!(
                "  admission: {:?}, min size {}, cooldown {}s",
                cfg.admission.filtering, cfg.admission.min_size, cfg.admission.cooldown
            );
            let idle = cfg
                .consumer
                .max_inactivity()
                .map_or_else(|| "never".to_string(), |d: Duration| format!("{}s", d.as_secs()));
            println!(
                "  consumer:  max time {}s, stop when idle {}",
                cfg.consumer.max_time, idle
            );
        }
    }

    Ok(())
}
