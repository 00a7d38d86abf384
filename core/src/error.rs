//! Error types for the capture subsystem.

use std::path::PathBuf;

/// Errors raised while reserving, capturing or dumping frames.
///
/// Capture-path errors (`AllocationFailure`, `OutOfCapacity`, `DimensionMismatch`,
/// `Source`) halt only the recording feature or drop a single frame. Dump-path errors
/// (`Encode`, `Io`) are collected per frame and never abort the whole dump.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The reservoir could not be sized or allocated.
    #[error("cannot reserve frame capture buffer (requested bytes: {requested:?})")]
    AllocationFailure {
        /// Requested size, or `None` when the size computation overflowed.
        requested: Option<usize>,
    },

    /// Every frame slot in the reservoir has already been used.
    #[error("reservoir is full ({capacity_frames} frames)")]
    OutOfCapacity { capacity_frames: usize },

    /// The pixel source changed size after the session bound its dimensions.
    #[error("frame is {actual:?} but session was started at {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// The reservoir buffer has already been released.
    #[error("reservoir has been released")]
    Released,

    /// The pixel source failed to produce a frame.
    #[error("pixel source failed: {0}")]
    Source(String),

    /// A frame could not be encoded.
    #[error("failed to encode {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },

    /// A frame file could not be created or written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dump directory could not be created.
    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration values that cannot describe a session.
    #[error("invalid capture config: {0}")]
    InvalidConfig(String),
}
