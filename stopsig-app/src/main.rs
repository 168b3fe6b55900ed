mod app;
mod participant;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use stopsig_experiment::ExperimentConfig;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

pub use app::App;
use participant::ParticipantProfile;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a stop-signal session against a simulated participant")]
struct Args {
    /// Seed for the session plan and the participant
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file with configuration overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the trial log as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Mean go reaction time in ms
    #[arg(long, default_value_t = 550.0)]
    go_rt_ms: f64,

    /// Go reaction time spread in ms
    #[arg(long, default_value_t = 100.0)]
    go_rt_sd_ms: f64,

    /// Stop-signal reaction time in ms
    #[arg(long, default_value_t = 250.0)]
    ssrt_ms: f64,

    /// Probability of pressing the mapped key
    #[arg(long, default_value_t = 0.95)]
    accuracy: f64,

    /// Probability of missing a trial outright
    #[arg(long, default_value_t = 0.02)]
    omission_rate: f64,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ExperimentConfig::from_json_str(&raw)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => ExperimentConfig::default(),
    };

    let profile = ParticipantProfile {
        go_rt_ms: args.go_rt_ms,
        go_rt_sd_ms: args.go_rt_sd_ms,
        ssrt_ms: args.ssrt_ms,
        accuracy: args.accuracy,
        omission_rate: args.omission_rate,
    };

    let app = App::new(config, args.seed, profile, args.output)?;
    app.run()?;

    Ok(())
}
