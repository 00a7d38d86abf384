//! CPU-rendered test scene used as a stand-in render target.
//!
//! Draws a checkerboard-textured quad drifting over a gradient, with a solid
//! red band along the bottom edge so the picture's orientation survives
//! inspection. Pixels are produced bottom row first, like a GL backbuffer.

use std::time::Duration;

use crate::error::CaptureError;
use crate::grabber::PixelSource;
use crate::reservoir::BYTES_PER_PIXEL;

/// Colour of the orientation band along the bottom edge.
pub const BOTTOM_BAND: [u8; 3] = [255, 0, 0];

const CHECKER_LIGHT: [u8; 3] = [235, 235, 220];
const CHECKER_DARK: [u8; 3] = [40, 40, 60];
const CHECKER_CELLS: u32 = 8;

/// Animated software render target.
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: u32,
    height: u32,
    time: f32,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            time: 0.0,
        }
    }

    /// Advance the animation clock.
    pub fn advance(&mut self, elapsed: Duration) {
        self.time += elapsed.as_secs_f32();
    }

    /// Seconds of animation so far.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Height of the orientation band in rows.
    pub fn band_rows(&self) -> u32 {
        (self.height / 16).max(1)
    }

    /// Colour at column `x`, row `y` counted from the bottom.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if y < self.band_rows() {
            return BOTTOM_BAND;
        }

        let half = (self.width.min(self.height) / 4).max(1) as f32;
        let cx = self.width as f32 * (0.5 + 0.25 * self.time.sin());
        let cy = self.height as f32 * 0.5;
        let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);

        if (fx - cx).abs() < half && (fy - cy).abs() < half {
            let u = ((fx - cx + half) / (2.0 * half) * CHECKER_CELLS as f32) as u32;
            let v = ((fy - cy + half) / (2.0 * half) * CHECKER_CELLS as f32) as u32;
            return if (u + v) % 2 == 0 {
                CHECKER_LIGHT
            } else {
                CHECKER_DARK
            };
        }

        let r = (x * 255 / self.width.max(1)) as u8;
        let g = (y * 255 / self.height.max(1)) as u8;
        [r, g, 96]
    }
}

impl PixelSource for TestPattern {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), CaptureError> {
        let expected = self.width as usize * self.height as usize * BYTES_PER_PIXEL;
        if dst.len() != expected {
            return Err(CaptureError::Source(format!(
                "destination holds {} bytes, frame needs {}",
                dst.len(),
                expected
            )));
        }

        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        if row_bytes == 0 {
            return Ok(());
        }
        for (y, row) in dst.chunks_exact_mut(row_bytes).enumerate() {
            for (x, px) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                px.copy_from_slice(&self.pixel(x as u32, y as u32));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dumper::{DumpOptions, dump_all};
    use crate::grabber::grab;
    use crate::reservoir::Reservoir;
    use tempfile::TempDir;

    #[test]
    fn test_first_row_is_bottom_band() {
        let mut pattern = TestPattern::new(32, 32);
        let mut frame = vec![0u8; 32 * 32 * 3];
        pattern.read_pixels(&mut frame).unwrap();
        assert_eq!(&frame[..3], &BOTTOM_BAND);
        assert_ne!(&frame[frame.len() - 3..], &BOTTOM_BAND);
    }

    #[test]
    fn test_animation_changes_frame() {
        let mut pattern = TestPattern::new(64, 48);
        let mut a = vec![0u8; 64 * 48 * 3];
        let mut b = a.clone();
        pattern.read_pixels(&mut a).unwrap();
        pattern.advance(Duration::from_millis(500));
        pattern.read_pixels(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_wrong_destination_size() {
        let mut pattern = TestPattern::new(4, 4);
        let mut short = vec![0u8; 10];
        assert!(matches!(
            pattern.read_pixels(&mut short),
            Err(CaptureError::Source(_))
        ));
    }

    #[test]
    fn test_dumped_image_has_band_at_bottom() {
        let dir = TempDir::new().unwrap();
        let mut pattern = TestPattern::new(40, 32);
        let mut reservoir = Reservoir::reserve(40, 32, 1, 1).unwrap();
        grab(&mut pattern, &mut reservoir).unwrap();

        let report = dump_all(reservoir, &DumpOptions::new(dir.path())).unwrap();
        let img = image::open(&report.written[0]).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 31).0, BOTTOM_BAND);
        assert_ne!(img.get_pixel(0, 0).0, BOTTOM_BAND);
    }
}
