//! Frame grabbing from a rendered pixel source into the reservoir.

use crate::error::CaptureError;
use crate::reservoir::{Reservoir, RowOrder};

/// A render target that can be read back as packed 8-bit RGB.
///
/// Implement this for whatever backbuffer the render loop draws into.
pub trait PixelSource {
    /// Current render target dimensions (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Row order of the pixels written by [`PixelSource::read_pixels`].
    fn row_order(&self) -> RowOrder {
        RowOrder::BottomUp
    }

    /// Copy the full render target into `dst` as `width * height * 3` bytes.
    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), CaptureError>;
}

/// Read the current frame from `source` into the next reservoir slot.
///
/// Call after the frame's draw calls and before presenting; otherwise the
/// pixels belong to a different frame. A failed read leaves the reservoir
/// as it was.
pub fn grab<S: PixelSource + ?Sized>(
    source: &mut S,
    reservoir: &mut Reservoir,
) -> Result<(), CaptureError> {
    let expected = (reservoir.width(), reservoir.height());
    let actual = source.dimensions();
    if actual != expected {
        return Err(CaptureError::DimensionMismatch { expected, actual });
    }

    let offset = reservoir.next_slot()?;
    if let Err(e) = source.read_pixels(reservoir.slot_mut(offset)) {
        reservoir.discard_last();
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source that fills every frame with a counter value.
    struct CountingSource {
        size: (u32, u32),
        next: u8,
        fail: bool,
    }

    impl PixelSource for CountingSource {
        fn dimensions(&self) -> (u32, u32) {
            self.size
        }

        fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), CaptureError> {
            if self.fail {
                return Err(CaptureError::Source("device lost".into()));
            }
            dst.fill(self.next);
            self.next += 1;
            Ok(())
        }
    }

    #[test]
    fn test_grab_advances_one_frame() {
        let mut reservoir = Reservoir::reserve(2, 2, 2, 1).unwrap();
        let mut source = CountingSource {
            size: (2, 2),
            next: 7,
            fail: false,
        };

        grab(&mut source, &mut reservoir).unwrap();
        grab(&mut source, &mut reservoir).unwrap();

        assert_eq!(reservoir.frames_written(), 2);
        assert!(reservoir.frame(0).unwrap().iter().all(|&b| b == 7));
        assert!(reservoir.frame(1).unwrap().iter().all(|&b| b == 8));
    }

    #[test]
    fn test_grab_past_capacity_is_rejected() {
        let mut reservoir = Reservoir::reserve(2, 2, 1, 1).unwrap();
        let mut source = CountingSource {
            size: (2, 2),
            next: 0,
            fail: false,
        };

        grab(&mut source, &mut reservoir).unwrap();
        let err = grab(&mut source, &mut reservoir).unwrap_err();
        assert!(matches!(err, CaptureError::OutOfCapacity { .. }));
        assert_eq!(reservoir.frames_written(), 1);
    }

    #[test]
    fn test_grab_rejects_resized_source() {
        let mut reservoir = Reservoir::reserve(4, 4, 1, 1).unwrap();
        let mut source = CountingSource {
            size: (8, 4),
            next: 0,
            fail: false,
        };

        let err = grab(&mut source, &mut reservoir).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::DimensionMismatch {
                expected: (4, 4),
                actual: (8, 4)
            }
        ));
        assert_eq!(reservoir.frames_written(), 0);
    }

    #[test]
    fn test_failed_read_does_not_commit_frame() {
        let mut reservoir = Reservoir::reserve(2, 2, 3, 1).unwrap();
        let mut source = CountingSource {
            size: (2, 2),
            next: 0,
            fail: true,
        };

        assert!(grab(&mut source, &mut reservoir).is_err());
        assert_eq!(reservoir.frames_written(), 0);
    }
}
