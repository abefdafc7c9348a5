//! CLI argument parsing with clap

use clap::{Args, Parser, Subcommand};

/// Regwatch - container-image version discovery
#[derive(Parser, Debug)]
#[command(name = "regwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report versions of the watched tag that are new relative to the
    /// previously known one. Reads a JSON request on stdin, writes the
    /// version list to stdout.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {}
