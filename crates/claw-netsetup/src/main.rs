//! Container network setup binary.
//!
//! Invoked once per container lifecycle action by the container runtime;
//! reads action-specific input on stdin/`-properties`, performs the
//! action, and prints a JSON result on stdout.

mod cli;

use std::io::Read;

use clap::Parser;
use claw_netsetup::config::SetupConfig;
use cli::{Action, Args};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        error!(action = ?args.action, handle = %args.handle, %err, "claw-netsetup failed");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> claw_netsetup::error::Result<()> {
    let config = SetupConfig::load(&args.config_file)?;
    let properties: serde_json::Value = serde_json::from_str(&args.properties)?;

    match args.action {
        Action::Up => {
            let stdin = read_stdin_json()?;
            let output = claw_netsetup::up(&config, &args.handle, &properties, &stdin)?;
            print_json(&output.properties)?;
        }
        Action::Down => {
            claw_netsetup::down(&config, &args.handle)?;
        }
        Action::NetOut => {
            let input: claw_netsetup::NetOutInput = serde_json::from_value(properties)?;
            claw_netsetup::net_out_action(&config, &args.handle, &input)?;
        }
        Action::NetIn => {
            let input: claw_netsetup::NetInInput = serde_json::from_value(properties)?;
            let output = claw_netsetup::net_in_action(&config, &args.handle, &input)?;
            print_json(&output)?;
        }
    }
    Ok(())
}

fn read_stdin_json() -> claw_netsetup::error::Result<claw_netsetup::UpInput> {
    let mut body = String::new();
    std::io::stdin().read_to_string(&mut body)?;
    Ok(serde_json::from_str(&body)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> claw_netsetup::error::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
