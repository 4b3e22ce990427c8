//! On-host policy reconciler binary.

use std::path::PathBuf;

use claw_policy_agent::{AgentConfig, Reconciler};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// On-host network policy reconciler.
#[derive(Parser, Debug)]
#[command(name = "claw-policy-agent")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long = "configFile", default_value = "/etc/claw/policy-agent.json")]
    config_file: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match AgentConfig::load(&args.config_file) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let reconciler = match Reconciler::new(config) {
        Ok(reconciler) => reconciler,
        Err(err) => {
            error!(%err, "failed to build reconciler");
            std::process::exit(1);
        }
    };

    reconciler.run().await;
}
