//! Command-line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Bring a local multi-component development environment up and down.
///
/// Every component runs its dev loop in its own tmux window inside one
/// session. A component marked as prerequisite is started first and must
/// answer on its UI port before anything else starts.
#[derive(Parser, Debug)]
#[command(name = "devloop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to devloop.yaml. Defaults to searching upwards from the current
    /// directory.
    #[arg(long, global = true, env = "DEVLOOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write debug logs to .devloop-debug.log in the current directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Increase log verbosity on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the session and every component window
    Up(UpArgs),

    /// Stop every component window and close the session
    Down(DownArgs),

    /// Show session, window and readiness state
    Status(StatusArgs),
}

#[derive(Args, Debug, Default)]
pub struct UpArgs {
    /// Destroy an existing session and start from scratch
    #[arg(long, conflicts_with = "reuse")]
    pub recreate: bool,

    /// Keep an existing session as it is
    #[arg(long)]
    pub reuse: bool,

    /// Do not ask before recreating an existing session
    #[arg(short, long)]
    pub yes: bool,

    /// Attach to the session once startup finishes
    #[arg(long)]
    pub attach: bool,
}

#[derive(Args, Debug, Default)]
pub struct DownArgs {
    /// Also remove cluster-side objects and reap leftover tool processes
    #[arg(long)]
    pub cleanup: bool,

    /// Do not ask before cleaning up
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Print the snapshot as JSON
    #[arg(long)]
    pub json: bool,
}
