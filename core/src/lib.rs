//! Framecap Core - fixed-rate frame capture for render loops
//!
//! Records the frames a render loop produces into one pre-allocated buffer at
//! a fixed capture rate, then dumps them as a numbered image sequence.
//!
//! # Architecture
//!
//! - [`Reservoir`] - Contiguous buffer sized for a whole recording session
//! - [`CaptureThrottle`] - Fixed-timestep accumulator deciding when to capture
//! - [`grab`] - Reads a [`PixelSource`] into the next reservoir slot
//! - [`dump_all`] - Writes every captured frame to disk, flipping bottom-up rows
//! - [`CaptureSession`] - Owns all of the above for one recording

pub mod config;
pub mod dumper;
pub mod error;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod grabber;
pub mod pattern;
pub mod reservoir;
pub mod session;
pub mod throttle;

pub use config::{CaptureConfig, Config};
pub use dumper::{DumpOptions, DumpReport, FrameFailure, FrameFormat, dump_all, flip_rows};
pub use error::CaptureError;
#[cfg(feature = "gpu")]
pub use gpu::{CaptureSupport, OffscreenTarget, read_capture_pixels, read_render_target_rgb};
pub use grabber::{PixelSource, grab};
pub use pattern::TestPattern;
pub use reservoir::{BYTES_PER_PIXEL, Reservoir, RowOrder, reservoir_bytes};
pub use session::{CaptureSession, FrameOutcome};
pub use throttle::{CaptureThrottle, RecordingState};
