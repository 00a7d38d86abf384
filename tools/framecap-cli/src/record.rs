//! Record command - headless render loop with capture
//!
//! Drives a render target at a fixed render rate, starts recording once
//! `--start-after` seconds have passed (the "record" key press), and stops
//! when the configured duration is reached or `--stop-after` closes the loop
//! early. The captured frames are then dumped in one pass.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use framecap_core::{
    CaptureConfig, CaptureSession, DumpReport, FrameFormat, PixelSource, RecordingState,
    TestPattern, config,
};

/// Render target driven by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// CPU-rendered test scene (bottom-up rows, like a GL backbuffer)
    Pattern,
    /// Offscreen wgpu render target
    Gpu,
}

/// Arguments for the record command
#[derive(Args)]
pub struct RecordArgs {
    /// Render target width in pixels
    #[arg(long, default_value = "640")]
    pub width: u32,

    /// Render target height in pixels
    #[arg(long, default_value = "480")]
    pub height: u32,

    /// Capture rate in frames per second (overrides config)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Recording duration in seconds (overrides config)
    #[arg(long)]
    pub seconds: Option<u32>,

    /// Directory for dumped frames (defaults to a timestamped session directory)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Image format for dumped frames: png or jpeg (overrides config)
    #[arg(long)]
    pub format: Option<FrameFormat>,

    /// JPEG quality 1-100 (overrides config)
    #[arg(long)]
    pub quality: Option<u8>,

    /// Render target to record
    #[arg(long, value_enum, default_value_t = SourceKind::Pattern)]
    pub source: SourceKind,

    /// Render loop rate in Hz
    #[arg(long, default_value = "60")]
    pub render_hz: u32,

    /// Seconds to render before recording starts
    #[arg(long, default_value = "0")]
    pub start_after: f32,

    /// Close the loop after this many seconds, even mid-recording
    #[arg(long)]
    pub stop_after: Option<f32>,

    /// Config file to use instead of the platform config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// A render target the loop can draw into and the session can read back.
trait RenderTarget: PixelSource {
    /// Draw the frame for `time` since the loop started.
    fn render(&mut self, time: Duration);
}

impl RenderTarget for TestPattern {
    fn render(&mut self, time: Duration) {
        let behind = time.as_secs_f32() - self.time();
        if behind > 0.0 {
            self.advance(Duration::from_secs_f32(behind));
        }
    }
}

#[cfg(feature = "gpu")]
impl RenderTarget for framecap_core::OffscreenTarget {
    fn render(&mut self, time: Duration) {
        framecap_core::OffscreenTarget::render(self, time.as_secs_f32());
    }
}

/// Execute the record command
pub fn execute(args: RecordArgs) -> Result<()> {
    match record(&args)? {
        Some(report) => {
            for failure in &report.failures {
                tracing::warn!("Frame {} not written: {}", failure.index, failure.error);
            }
            if let Some(last) = report.written.last() {
                let dir = last.parent().map(|p| p.display().to_string()).unwrap_or_default();
                println!(
                    "Wrote {} frames to {} ({} failed)",
                    report.written_count(),
                    dir,
                    report.failure_count()
                );
            } else {
                println!("No frames written ({} failed)", report.failure_count());
            }
        }
        None => println!("Nothing was recorded"),
    }
    Ok(())
}

/// Resolve the capture config from file and command-line overrides.
fn capture_config(args: &RecordArgs) -> Result<CaptureConfig> {
    let mut capture = match &args.config {
        Some(path) => config::load_from(path)?.capture,
        None => config::load().capture,
    };

    if let Some(fps) = args.fps {
        capture.fps = fps;
    }
    if let Some(seconds) = args.seconds {
        capture.seconds = seconds;
    }
    if let Some(out) = &args.out {
        capture.output_dir = Some(out.clone());
    }
    if let Some(format) = args.format {
        capture.format = format;
    }
    if let Some(quality) = args.quality {
        capture.jpeg_quality = quality;
    }

    capture.validate()?;
    Ok(capture)
}

/// Convert a seconds argument into a `Duration`, clamping negatives to zero.
fn seconds_arg(name: &str, seconds: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(seconds.max(0.0))
        .with_context(|| format!("Invalid --{name} value {seconds}"))
}

/// When recording starts and when the loop closes, relative to loop start.
struct LoopSchedule {
    frame_budget: Duration,
    start_after: Duration,
    stop_after: Option<Duration>,
}

impl LoopSchedule {
    fn from_args(args: &RecordArgs) -> Result<Self> {
        Ok(Self {
            frame_budget: Duration::from_nanos(1_000_000_000u64 / args.render_hz.max(1) as u64),
            start_after: seconds_arg("start-after", args.start_after)?,
            stop_after: args
                .stop_after
                .map(|s| seconds_arg("stop-after", s))
                .transpose()?,
        })
    }
}

/// Run the loop and dump whatever was recorded.
fn record(args: &RecordArgs) -> Result<Option<DumpReport>> {
    let capture = capture_config(args)?;
    let schedule = LoopSchedule::from_args(args)?;
    let options = capture.dump_options(chrono::Local::now());
    let mut session = CaptureSession::new(capture, options);

    match args.source {
        SourceKind::Pattern => {
            let mut target = TestPattern::new(args.width, args.height);
            run_loop(args, &schedule, &mut session, &mut target);
        }
        SourceKind::Gpu => {
            #[cfg(feature = "gpu")]
            {
                let mut target = framecap_core::OffscreenTarget::new(args.width, args.height)
                    .context("Failed to create offscreen render target")?;
                run_loop(args, &schedule, &mut session, &mut target);
            }
            #[cfg(not(feature = "gpu"))]
            anyhow::bail!("framecap was built without the `gpu` feature");
        }
    }

    session.finish().context("Failed to dump video frames")
}

fn run_loop<T: RenderTarget>(
    args: &RecordArgs,
    schedule: &LoopSchedule,
    session: &mut CaptureSession,
    target: &mut T,
) {
    tracing::info!(
        "Render loop: {}x{} at {}Hz, recording starts after {:.1}s",
        args.width,
        args.height,
        args.render_hz,
        schedule.start_after.as_secs_f32()
    );

    let loop_start = Instant::now();
    let mut previous = loop_start;
    let mut frame: u64 = 0;
    loop {
        let frame_start = Instant::now();
        let elapsed = frame_start - previous;
        previous = frame_start;
        let running = frame_start - loop_start;

        if let Some(limit) = schedule.stop_after {
            if running >= limit {
                tracing::info!("Loop closed after {:.1}s", running.as_secs_f32());
                break;
            }
        }

        target.render(running);

        // The trigger frame contributes no recorded time.
        let mut tick = elapsed;
        if running >= schedule.start_after
            && session.state() == RecordingState::Idle
            && !session.is_disabled()
        {
            match session.start_for(&*target) {
                Ok(()) => tick = Duration::ZERO,
                Err(e) => {
                    tracing::warn!("Continuing without recording: {}", e);
                    if schedule.stop_after.is_none() {
                        tracing::warn!("No --stop-after given, the loop runs until interrupted");
                    }
                }
            }
        }

        let outcome = session.on_frame(tick, &mut *target);
        if outcome.finished {
            tracing::info!(
                "Recorded {}s of video ({} frames)",
                session.config().seconds,
                session.frames_captured()
            );
            break;
        }

        frame += 1;
        if frame % 120 == 0 {
            tracing::debug!(
                "frame={} recorded={:.1}s captured={}",
                frame,
                session.elapsed().as_secs_f32(),
                session.frames_captured()
            );
        }

        let spent = frame_start.elapsed();
        if spent < schedule.frame_budget {
            thread::sleep(schedule.frame_budget - spent);
        }
    }
}
