//! Fixed-rate capture throttle.
//!
//! Decouples the variable render rate from the fixed capture rate with a
//! fixed-timestep accumulator, and tracks the recording state machine.

use std::time::Duration;

/// Recording state machine: `Idle -> Recording -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    /// Waiting for the start trigger.
    #[default]
    Idle,
    /// Capturing frames.
    Recording,
    /// Terminal. The session is ready to be dumped.
    Finished,
}

/// Decides how many captures are due given elapsed wall-clock time.
///
/// Time is kept as [`Duration`] so accumulation is exact: splitting the same
/// total elapsed time across any number of ticks yields the same capture count.
#[derive(Debug, Clone)]
pub struct CaptureThrottle {
    frame_interval: Duration,
    target: Duration,
    accumulated: Duration,
    elapsed_total: Duration,
    state: RecordingState,
}

impl CaptureThrottle {
    /// Create an idle throttle for `fps` captures per second over `seconds`.
    pub fn new(fps: u32, seconds: u32) -> Self {
        let safe_fps = fps.max(1);
        Self {
            frame_interval: Duration::from_nanos(1_000_000_000u64 / safe_fps as u64),
            target: Duration::from_secs(seconds as u64),
            accumulated: Duration::ZERO,
            elapsed_total: Duration::ZERO,
            state: RecordingState::Idle,
        }
    }

    /// Fixed timestep between captures (1 / fps).
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Total recording duration after which the throttle finishes.
    pub fn target(&self) -> Duration {
        self.target
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Time recorded since `start()`.
    pub fn total_elapsed(&self) -> Duration {
        self.elapsed_total
    }

    /// Time accumulated towards the next capture.
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    /// Begin recording. Only the first call has an effect.
    ///
    /// Returns `true` if this call moved the throttle from `Idle` to `Recording`.
    pub fn start(&mut self) -> bool {
        if self.state != RecordingState::Idle {
            return false;
        }
        self.state = RecordingState::Recording;
        self.accumulated = Duration::ZERO;
        self.elapsed_total = Duration::ZERO;
        true
    }

    /// Force the terminal state (e.g. the render loop is exiting).
    pub fn stop(&mut self) {
        self.state = RecordingState::Finished;
    }

    /// Advance by `elapsed` and return how many captures are due.
    ///
    /// Every whole frame interval drained from the accumulator yields one
    /// capture, so a stalled render loop catches up rather than drifting.
    /// Once the total recorded time exceeds the target the throttle finishes
    /// and returns zero.
    pub fn tick(&mut self, elapsed: Duration) -> u32 {
        if self.state != RecordingState::Recording {
            return 0;
        }

        self.elapsed_total += elapsed;
        if self.elapsed_total > self.target {
            self.state = RecordingState::Finished;
            return 0;
        }

        self.accumulated += elapsed;
        let mut due = 0u32;
        while self.accumulated >= self.frame_interval {
            self.accumulated -= self.frame_interval;
            due += 1;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // =============================================================
    // State machine
    // =============================================================

    #[test]
    fn test_idle_ignores_ticks() {
        let mut throttle = CaptureThrottle::new(25, 10);
        assert_eq!(throttle.tick(ms(500)), 0);
        assert_eq!(throttle.state(), RecordingState::Idle);
        assert_eq!(throttle.total_elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_start_is_edge_triggered() {
        let mut throttle = CaptureThrottle::new(25, 10);
        assert!(throttle.start());
        throttle.tick(ms(100));
        assert!(!throttle.start());
        assert_eq!(throttle.total_elapsed(), ms(100));
    }

    #[test]
    fn test_finishes_after_target() {
        let mut throttle = CaptureThrottle::new(25, 1);
        throttle.start();
        assert_eq!(throttle.tick(ms(1000)), 25);
        assert!(throttle.is_recording());
        assert_eq!(throttle.tick(ms(1)), 0);
        assert_eq!(throttle.state(), RecordingState::Finished);
        assert_eq!(throttle.tick(ms(1000)), 0);
        assert!(!throttle.start());
    }

    #[test]
    fn test_stop_is_terminal() {
        let mut throttle = CaptureThrottle::new(25, 10);
        throttle.start();
        throttle.stop();
        assert_eq!(throttle.tick(ms(80)), 0);
        assert_eq!(throttle.state(), RecordingState::Finished);
    }

    // =============================================================
    // Accumulation
    // =============================================================

    #[test]
    fn test_frame_interval_at_25_fps() {
        assert_eq!(CaptureThrottle::new(25, 10).frame_interval(), ms(40));
    }

    #[test]
    fn test_slow_loop_catches_up() {
        let mut throttle = CaptureThrottle::new(25, 10);
        throttle.start();
        // A 130ms stall drains three 40ms intervals.
        assert_eq!(throttle.tick(ms(130)), 3);
        assert_eq!(throttle.accumulated(), ms(10));
        assert_eq!(throttle.tick(ms(30)), 1);
        assert_eq!(throttle.accumulated(), Duration::ZERO);
    }

    #[test]
    fn test_fast_loop_fires_at_most_once_per_interval() {
        let mut throttle = CaptureThrottle::new(25, 10);
        throttle.start();
        let fired: u32 = (0..60).map(|_| throttle.tick(Duration::from_micros(16_667))).sum();
        // 60 * 16.667ms = 1.00002s -> 25 captures.
        assert_eq!(fired, 25);
    }

    #[test]
    fn test_accumulator_below_interval_after_tick() {
        let mut throttle = CaptureThrottle::new(30, 10);
        throttle.start();
        for dt in [1u64, 7, 33, 34, 250, 3, 99] {
            throttle.tick(ms(dt));
            assert!(throttle.accumulated() < throttle.frame_interval());
        }
    }

    #[test]
    fn test_capture_count_independent_of_tick_split() {
        let interval = CaptureThrottle::new(25, 10).frame_interval();
        let splits: [&[u64]; 4] = [
            &[2_000],
            &[1_000, 1_000],
            &[17, 17, 17, 1_949],
            &[333, 1, 666, 999, 1],
        ];

        for split in splits {
            let mut throttle = CaptureThrottle::new(25, 10);
            throttle.start();
            let total: u32 = split.iter().map(|&dt| throttle.tick(ms(dt))).sum();
            let sum: Duration = split.iter().map(|&dt| ms(dt)).sum();
            let expected = (sum.as_nanos() / interval.as_nanos()) as u32;
            assert_eq!(total, expected, "split {split:?}");
            assert_eq!(total, 50);
        }
    }

    #[test]
    fn test_full_session_never_exceeds_slot_budget() {
        let (fps, seconds) = (30, 3);
        let mut throttle = CaptureThrottle::new(fps, seconds);
        throttle.start();
        let mut total = 0u32;
        while throttle.is_recording() {
            total += throttle.tick(Duration::from_micros(6_944));
        }
        assert!(total <= fps * seconds);
        assert!(total >= fps * seconds - 1);
    }
}
