//! Framecap CLI - headless render loop with fixed-rate frame capture
//!
//! # Commands
//!
//! - `framecap record` - Run a render loop, record it, dump the frames as images
//! - `framecap info` - Show how much memory a recording would reserve
//! - `framecap init-config` - Write a default config.toml
//!
//! # Usage
//!
//! ```bash
//! # Record 10s at 25fps of the test scene, starting after one second
//! framecap record --start-after 1 --out frames/
//!
//! # Simulate closing the window halfway through a recording
//! framecap record --seconds 10 --stop-after 4
//!
//! # Reservoir size for an 800x800 window
//! framecap info --width 800 --height 800
//! ```
//!
//! Set `RUST_LOG=debug` to see every frame as it is written.

mod info;
mod init_config;
mod record;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Framecap - record a render loop into an image sequence
#[derive(Parser)]
#[command(name = "framecap")]
#[command(about = "Record a render loop into an image sequence")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a render loop, record it, and dump the frames
    Record(record::RecordArgs),

    /// Show the reservoir size for a recording
    Info(info::InfoArgs),

    /// Write a default config.toml
    InitConfig(init_config::InitConfigArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record(args) => record::execute(args),
        Commands::Info(args) => info::execute(args),
        Commands::InitConfig(args) => init_config::execute(args),
    }
}
