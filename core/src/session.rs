//! Capture session: the aggregate the render loop drives.
//!
//! Owns the throttle and the reservoir for one recording. The render loop
//! passes the session by `&mut` into every iteration; there is no global
//! capture state.
//!
//! ```ignore
//! let mut session = CaptureSession::new(config, options);
//! while running {
//!     let elapsed = clock.tick();
//!     render(&mut target);
//!     if start_pressed {
//!         session.start(target.dimensions().0, target.dimensions().1);
//!     }
//!     if session.on_frame(elapsed, &mut target).finished {
//!         break;
//!     }
//!     present();
//! }
//! if let Some(report) = session.finish()? { /* ... */ }
//! ```

use std::time::Duration;

use crate::config::CaptureConfig;
use crate::dumper::{DumpOptions, DumpReport, dump_all};
use crate::error::CaptureError;
use crate::grabber::{PixelSource, grab};
use crate::reservoir::{Reservoir, RowOrder};
use crate::throttle::{CaptureThrottle, RecordingState};

/// Result of feeding one render-loop iteration to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Frames committed to the reservoir this iteration.
    pub captured: u32,
    /// Frames due but dropped (full reservoir, resized or failing source).
    pub dropped: u32,
    /// The session reached its target duration and should be finished.
    pub finished: bool,
}

/// A single recording: `Idle -> Recording -> Finished`, then one dump.
pub struct CaptureSession {
    config: CaptureConfig,
    dump_options: DumpOptions,
    throttle: CaptureThrottle,
    reservoir: Option<Reservoir>,
    dimensions: Option<(u32, u32)>,
    disabled: bool,
    dumped: bool,
}

impl CaptureSession {
    /// Create an idle session that dumps into `dump_options.out_dir`.
    pub fn new(config: CaptureConfig, dump_options: DumpOptions) -> Self {
        let throttle = CaptureThrottle::new(config.fps, config.seconds);
        Self {
            config,
            dump_options,
            throttle,
            reservoir: None,
            dimensions: None,
            disabled: false,
            dumped: false,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn dump_options(&self) -> &DumpOptions {
        &self.dump_options
    }

    pub fn state(&self) -> RecordingState {
        self.throttle.state()
    }

    pub fn is_recording(&self) -> bool {
        self.throttle.is_recording()
    }

    /// `true` once reserving the buffer has failed; recording stays off.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Dimensions bound at `start()`.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Time recorded so far.
    pub fn elapsed(&self) -> Duration {
        self.throttle.total_elapsed()
    }

    /// Frames captured so far.
    pub fn frames_captured(&self) -> usize {
        self.reservoir.as_ref().map_or(0, Reservoir::frames_written)
    }

    /// Start recording at the current render target size.
    ///
    /// Edge-triggered: only the first call from `Idle` does anything. If the
    /// reservoir cannot be allocated the error is returned, the session is
    /// disabled, and the render loop carries on without recording.
    pub fn start(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        self.start_with_order(width, height, RowOrder::default())
    }

    /// Start recording from a source with the given row order.
    pub fn start_with_order(
        &mut self,
        width: u32,
        height: u32,
        row_order: RowOrder,
    ) -> Result<(), CaptureError> {
        if self.disabled {
            tracing::warn!("Recording unavailable for this session, ignoring start");
            return Ok(());
        }
        if self.throttle.state() != RecordingState::Idle {
            return Ok(());
        }

        let reservoir = match Reservoir::reserve_with_order(
            width,
            height,
            self.config.fps,
            self.config.seconds,
            row_order,
        ) {
            Ok(reservoir) => reservoir,
            Err(e) => {
                tracing::error!("Recording disabled: {}", e);
                self.disabled = true;
                return Err(e);
            }
        };

        tracing::info!(
            "Recording started ({}x{}, {}fps, {}s, {} MB reserved)",
            width,
            height,
            self.config.fps,
            self.config.seconds,
            reservoir.capacity_bytes() / 1_000_000
        );
        self.reservoir = Some(reservoir);
        self.dimensions = Some((width, height));
        self.throttle.start();
        Ok(())
    }

    /// Start recording at the size and row order reported by `source`.
    pub fn start_for<S: PixelSource + ?Sized>(&mut self, source: &S) -> Result<(), CaptureError> {
        let (width, height) = source.dimensions();
        self.start_with_order(width, height, source.row_order())
    }

    /// Feed one render-loop iteration.
    ///
    /// Call after drawing and before presenting. `elapsed` is the wall-clock
    /// time since the previous iteration. Grabs one frame per capture the
    /// throttle reports due; frames that cannot be stored are dropped with a
    /// warning and never abort the render loop.
    pub fn on_frame<S: PixelSource + ?Sized>(
        &mut self,
        elapsed: Duration,
        source: &mut S,
    ) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();
        let due = self.throttle.tick(elapsed);

        if let Some(reservoir) = self.reservoir.as_mut() {
            for _ in 0..due {
                match grab(&mut *source, reservoir) {
                    Ok(()) => outcome.captured += 1,
                    Err(e) => {
                        tracing::warn!("Dropped video frame: {}", e);
                        outcome.dropped += 1;
                    }
                }
            }
        }

        if self.throttle.state() == RecordingState::Finished && !self.dumped {
            outcome.finished = true;
        }
        outcome
    }

    /// Stop recording and dump the captured frames.
    ///
    /// Runs the dump at most once. Returns `Ok(None)` when nothing was
    /// recorded or the dump already happened. The reservoir is released on
    /// every path.
    pub fn finish(&mut self) -> Result<Option<DumpReport>, CaptureError> {
        if self.throttle.state() == RecordingState::Recording {
            tracing::info!(
                "Recording stopped after {:.1}s",
                self.throttle.total_elapsed().as_secs_f32()
            );
        }
        self.throttle.stop();

        let Some(reservoir) = self.reservoir.take() else {
            return Ok(None);
        };
        self.dumped = true;
        dump_all(reservoir, &self.dump_options).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dumper::FrameFormat;
    use tempfile::TempDir;

    struct SolidSource {
        size: (u32, u32),
        color: [u8; 3],
    }

    impl PixelSource for SolidSource {
        fn dimensions(&self) -> (u32, u32) {
            self.size
        }

        fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), CaptureError> {
            for px in dst.chunks_exact_mut(3) {
                px.copy_from_slice(&self.color);
            }
            Ok(())
        }
    }

    fn config(fps: u32, seconds: u32) -> CaptureConfig {
        CaptureConfig {
            fps,
            seconds,
            ..CaptureConfig::default()
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // =============================================================
    // State machine
    // =============================================================

    #[test]
    fn test_idle_session_captures_nothing() {
        let dir = TempDir::new().unwrap();
        let mut session = CaptureSession::new(config(25, 10), DumpOptions::new(dir.path()));
        let mut source = SolidSource {
            size: (4, 4),
            color: [1, 2, 3],
        };

        let outcome = session.on_frame(ms(100), &mut source);
        assert_eq!(outcome, FrameOutcome::default());
        assert_eq!(session.state(), RecordingState::Idle);
        assert!(session.finish().unwrap().is_none());
    }

    #[test]
    fn test_full_session_finishes_and_dumps_once() {
        let dir = TempDir::new().unwrap();
        let mut session = CaptureSession::new(config(5, 1), DumpOptions::new(dir.path()));
        let mut source = SolidSource {
            size: (4, 2),
            color: [9, 9, 9],
        };

        session.start_for(&source).unwrap();
        assert!(session.is_recording());

        let mut captured = 0;
        let mut finished = false;
        for _ in 0..20 {
            let outcome = session.on_frame(ms(100), &mut source);
            captured += outcome.captured;
            if outcome.finished {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert_eq!(captured, 5);

        let report = session.finish().unwrap().unwrap();
        assert_eq!(report.written_count(), 5);
        assert!(session.finish().unwrap().is_none());
    }

    #[test]
    fn test_second_start_keeps_bound_dimensions() {
        let dir = TempDir::new().unwrap();
        let mut session = CaptureSession::new(config(25, 1), DumpOptions::new(dir.path()));
        session.start(8, 8).unwrap();
        session.start(16, 16).unwrap();
        assert_eq!(session.dimensions(), Some((8, 8)));
    }

    // =============================================================
    // Error handling
    // =============================================================

    #[test]
    fn test_allocation_failure_disables_recording() {
        let dir = TempDir::new().unwrap();
        let mut session =
            CaptureSession::new(config(u32::MAX, u32::MAX), DumpOptions::new(dir.path()));

        let err = session.start(u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err, CaptureError::AllocationFailure { .. }));
        assert!(session.is_disabled());
        assert_eq!(session.state(), RecordingState::Idle);

        // Further triggers are ignored rather than retried.
        assert!(session.start(1, 1).is_ok());
        assert_eq!(session.state(), RecordingState::Idle);
    }

    #[test]
    fn test_resized_source_drops_frames() {
        let dir = TempDir::new().unwrap();
        let mut session = CaptureSession::new(config(25, 10), DumpOptions::new(dir.path()));
        session.start(4, 4).unwrap();

        let mut resized = SolidSource {
            size: (5, 4),
            color: [0, 0, 0],
        };
        let outcome = session.on_frame(ms(80), &mut resized);
        assert_eq!(outcome.captured, 0);
        assert_eq!(outcome.dropped, 2);
        assert_eq!(session.frames_captured(), 0);
    }

    // =============================================================
    // Early stop
    // =============================================================

    #[test]
    fn test_early_stop_dumps_partial_prefix() {
        let dir = TempDir::new().unwrap();
        let options = DumpOptions {
            format: FrameFormat::Png,
            ..DumpOptions::new(dir.path().join("session"))
        };
        let mut session = CaptureSession::new(config(25, 10), options);
        let mut source = SolidSource {
            size: (6, 6),
            color: [200, 100, 50],
        };

        session.start_for(&source).unwrap();
        // 3 intervals of 40ms, then the window closes.
        for _ in 0..3 {
            assert_eq!(session.on_frame(ms(40), &mut source).captured, 1);
        }
        assert_eq!(session.frames_captured(), 3);

        let report = session.finish().unwrap().unwrap();
        assert_eq!(report.written_count(), 3);
        assert_eq!(session.state(), RecordingState::Finished);
        assert_eq!(
            std::fs::read_dir(dir.path().join("session")).unwrap().count(),
            3
        );
    }
}
