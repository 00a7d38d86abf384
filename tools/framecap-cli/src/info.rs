//! Info command - reservoir sizing for a recording

use anyhow::{Result, bail};
use clap::Args;
use framecap_core::{BYTES_PER_PIXEL, reservoir_bytes};

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// Render target width in pixels
    #[arg(long, default_value = "640")]
    pub width: u32,

    /// Render target height in pixels
    #[arg(long, default_value = "480")]
    pub height: u32,

    /// Capture rate in frames per second
    #[arg(long, default_value = "25")]
    pub fps: u32,

    /// Recording duration in seconds
    #[arg(long, default_value = "10")]
    pub seconds: u32,
}

/// Execute the info command
pub fn execute(args: InfoArgs) -> Result<()> {
    println!("{}", describe(&args)?);
    Ok(())
}

fn describe(args: &InfoArgs) -> Result<String> {
    let Some(total) = reservoir_bytes(args.width, args.height, args.fps, args.seconds) else {
        bail!(
            "{}x{} at {}fps for {}s does not fit in memory",
            args.width,
            args.height,
            args.fps,
            args.seconds
        );
    };
    let frame = args.width as usize * args.height as usize * BYTES_PER_PIXEL;
    let frames = args.fps as u64 * args.seconds as u64;

    Ok(format!(
        "{}x{} RGB frame: {} bytes\n{} frames ({}fps x {}s)\nreservoir: {} bytes ({:.1} MB)",
        args.width,
        args.height,
        frame,
        frames,
        args.fps,
        args.seconds,
        total,
        total as f64 / 1_000_000.0
    ))
}
