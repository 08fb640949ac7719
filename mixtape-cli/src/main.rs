//! mixtape - AI-driven automated DJ set generator
//!
//! Subcommands:
//! - `generate`: plan a set for a vibe and render it to WAV
//! - `scan`: analyze the configured library and exit
//! - `status`: print the stored analysis for one file

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use mixtape_cli::Orchestrator;
use mixtape_common::config::Config;
use mixtape_common::events::PipelineEvent;
use mixtape_common::set::EnergyPattern;
use mixtape_planner::PlanRequest;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mixtape", version, about = "AI-driven automated DJ set generator")]
struct Cli {
    /// Path to a TOML config file (otherwise resolved from the environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan and render a DJ set for a vibe description
    Generate {
        /// The vibe, e.g. "late night warehouse techno"
        vibe: String,

        /// Target set length in minutes
        #[arg(long, default_value_t = 30)]
        duration: u32,

        /// Energy pattern across the set
        #[arg(long, value_enum, default_value_t = PatternArg::Wave)]
        pattern: PatternArg,

        /// Cap each track's playable segment to this many seconds
        #[arg(long)]
        track_cap: Option<f64>,

        /// Set name (defaults to one derived from the vibe)
        #[arg(long)]
        name: Option<String>,
    },

    /// Analyze the configured library and exit
    Scan,

    /// Print the stored analysis for a file
    Status {
        /// Filepath as stored in the library
        filepath: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PatternArg {
    Building,
    Cooling,
    PeakTime,
    Wave,
}

impl From<PatternArg> for EnergyPattern {
    fn from(arg: PatternArg) -> Self {
        match arg {
            PatternArg::Building => EnergyPattern::Building,
            PatternArg::Cooling => EnergyPattern::Cooling,
            PatternArg::PeakTime => EnergyPattern::PeakTime,
            PatternArg::Wave => EnergyPattern::Wave,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    info!(
        database = %config.database_path.display(),
        roots = config.library_roots.len(),
        "Starting mixtape"
    );

    // Ctrl-C requests cooperative cancellation at the next stage boundary
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Cancellation requested");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Generate {
            vibe,
            duration,
            pattern,
            track_cap,
            name,
        } => {
            let orchestrator = Orchestrator::from_config(config).await?;

            // Surface render progress while the pipeline runs
            let mut events = orchestrator.event_bus().subscribe();
            let progress_task = tokio::spawn(async move {
                let mut last_reported = -1i64;
                while let Ok(event) = events.recv().await {
                    if let PipelineEvent::RenderProgress { fraction, .. } = event {
                        let percent = (fraction * 100.0) as i64;
                        if percent / 10 > last_reported / 10 {
                            info!("Render progress: {percent}%");
                            last_reported = percent;
                        }
                    }
                }
            });

            let request = PlanRequest {
                vibe,
                duration_minutes: duration,
                energy_pattern: pattern.into(),
                track_length_cap: track_cap,
                name,
            };

            let result = orchestrator.generate_set(&request, &cancel).await;
            orchestrator.shutdown().await;
            progress_task.abort();

            let generated = result?;
            info!(
                set = %generated.dj_set.name,
                tracks = generated.dj_set.tracks.len(),
                duration_secs = generated.dj_set.total_duration,
                "Set complete"
            );
            println!("{}", generated.output_path.display());
        }

        Command::Scan => {
            let orchestrator = Orchestrator::from_config(config).await?;
            let analyzed = orchestrator.ensure_library_analyzed(&cancel).await;
            orchestrator.shutdown().await;
            let analyzed = analyzed?;
            info!(analyzed, "Library scan finished");
        }

        Command::Status { filepath } => {
            let orchestrator = Orchestrator::from_config(config).await?;
            match orchestrator.store().get(&filepath).await? {
                Some(track) => println!("{}", serde_json::to_string_pretty(&track)?),
                None => {
                    warn!(filepath, "No stored analysis");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
