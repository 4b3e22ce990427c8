//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Container network setup, invoked once per lifecycle event by the
/// container runtime.
#[derive(Parser, Debug, Clone)]
#[command(name = "claw-netsetup")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Lifecycle action to perform.
    #[arg(short, long, value_enum)]
    pub action: Action,

    /// Container runtime's opaque handle for this container.
    #[arg(long)]
    pub handle: String,

    /// Path to the JSON configuration file.
    #[arg(long = "configFile")]
    pub config_file: PathBuf,

    /// Action-specific JSON properties.
    #[arg(long)]
    pub properties: String,
}

/// Lifecycle actions `claw-netsetup` supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Action {
    /// Bind-mount the netns, run the CNI delegate chain, wire the netout chain.
    Up,
    /// Reverse of `up`.
    Down,
    /// Insert an egress allow rule into the container's netout chain.
    NetOut,
    /// Allocate/resolve a host port and DNAT into the container.
    NetIn,
}
