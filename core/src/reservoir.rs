//! Frame buffer reservoir.
//!
//! One contiguous byte buffer sized up front for an entire recording session.
//! Frames are addressed by sequence index; the write cursor only ever moves
//! forward during capture and is rewound once for the dump pass.

use crate::error::CaptureError;

/// Bytes per captured pixel (packed 8-bit RGB).
pub const BYTES_PER_PIXEL: usize = 3;

/// Vertical order of rows in a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    /// Row 0 is the bottom of the picture (GL backbuffer convention).
    #[default]
    BottomUp,
    /// Row 0 is the top of the picture (wgpu textures, image files).
    TopDown,
}

/// Size in bytes of a reservoir holding `fps * seconds` RGB frames.
///
/// Returns `None` if the product does not fit in `usize`.
pub fn reservoir_bytes(width: u32, height: u32, fps: u32, seconds: u32) -> Option<usize> {
    frame_bytes(width, height)?
        .checked_mul(fps as usize)?
        .checked_mul(seconds as usize)
}

fn frame_bytes(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

/// Pre-allocated storage for every frame of a recording session.
#[derive(Debug)]
pub struct Reservoir {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
    row_order: RowOrder,
    frame_bytes: usize,
    capacity_bytes: usize,
    /// Byte offset of the next slot (capture) or next frame to read (dump).
    cursor: usize,
    frames_written: usize,
    released: bool,
}

impl Reservoir {
    /// Reserve space for `fps * seconds` frames of `width x height` RGB pixels.
    ///
    /// The whole block is acquired here; capture never allocates. Fails with
    /// [`CaptureError::AllocationFailure`] when the size overflows or the
    /// allocator refuses the request.
    pub fn reserve(width: u32, height: u32, fps: u32, seconds: u32) -> Result<Self, CaptureError> {
        Self::reserve_with_order(width, height, fps, seconds, RowOrder::default())
    }

    /// Like [`Reservoir::reserve`], recording the row order of the pixel source.
    pub fn reserve_with_order(
        width: u32,
        height: u32,
        fps: u32,
        seconds: u32,
        row_order: RowOrder,
    ) -> Result<Self, CaptureError> {
        let frame_bytes =
            frame_bytes(width, height).ok_or(CaptureError::AllocationFailure { requested: None })?;
        let capacity_bytes = reservoir_bytes(width, height, fps, seconds)
            .filter(|&n| n <= isize::MAX as usize)
            .ok_or(CaptureError::AllocationFailure { requested: None })?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity_bytes)
            .map_err(|_| CaptureError::AllocationFailure {
                requested: Some(capacity_bytes),
            })?;

        tracing::debug!(
            "Reserved {} bytes for {} frames ({}x{})",
            capacity_bytes,
            fps as usize * seconds as usize,
            width,
            height
        );

        Ok(Self {
            buffer,
            width,
            height,
            row_order,
            frame_bytes,
            capacity_bytes,
            cursor: 0,
            frames_written: 0,
            released: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    /// Size of one frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Total size fixed at reservation time.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Number of frame slots the reservoir can hold.
    pub fn capacity_frames(&self) -> usize {
        if self.frame_bytes == 0 {
            0
        } else {
            self.capacity_bytes / self.frame_bytes
        }
    }

    /// Number of frames committed by the capture path.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Claim the next frame slot and return its byte offset.
    ///
    /// Advances the cursor by one frame. Returns
    /// [`CaptureError::OutOfCapacity`] instead of ever writing past the
    /// reserved block.
    pub fn next_slot(&mut self) -> Result<usize, CaptureError> {
        if self.released {
            return Err(CaptureError::Released);
        }
        let end = self
            .cursor
            .checked_add(self.frame_bytes)
            .filter(|&end| end <= self.capacity_bytes && self.frame_bytes > 0)
            .ok_or(CaptureError::OutOfCapacity {
                capacity_frames: self.capacity_frames(),
            })?;

        let offset = self.cursor;
        // Within the reserved capacity, so this never reallocates.
        self.buffer.resize(end, 0);
        self.cursor = end;
        self.frames_written += 1;
        Ok(offset)
    }

    /// Mutable view of the frame slot starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` was not returned by [`Reservoir::next_slot`].
    pub fn slot_mut(&mut self, offset: usize) -> &mut [u8] {
        &mut self.buffer[offset..offset + self.frame_bytes]
    }

    /// Roll back the most recently claimed slot.
    ///
    /// Used when the pixel read for that slot failed, so no partial frame is
    /// ever dumped.
    pub fn discard_last(&mut self) {
        if self.frames_written == 0 || self.released {
            return;
        }
        self.frames_written -= 1;
        self.cursor = self.frames_written * self.frame_bytes;
        self.buffer.truncate(self.cursor);
    }

    /// Rewind the cursor to the first frame for sequential reading.
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Read the frame at the cursor and advance past it.
    ///
    /// Stops after the last frame actually written, never at the configured
    /// total.
    pub fn next_frame(&mut self) -> Option<&[u8]> {
        let end = self.cursor.checked_add(self.frame_bytes)?;
        if self.released || self.frame_bytes == 0 || end > self.frames_written * self.frame_bytes {
            return None;
        }
        let start = self.cursor;
        self.cursor = end;
        Some(&self.buffer[start..end])
    }

    /// Frame `index` in capture order, if it was written.
    pub fn frame(&self, index: usize) -> Option<&[u8]> {
        if self.released || index >= self.frames_written {
            return None;
        }
        let start = index * self.frame_bytes;
        Some(&self.buffer[start..start + self.frame_bytes])
    }

    /// Free the buffer. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.buffer = Vec::new();
        self.cursor = 0;
        self.released = true;
        tracing::debug!("Released frame reservoir ({} bytes)", self.capacity_bytes);
    }
}

impl Drop for Reservoir {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================================
    // Capacity formula
    // =============================================================

    #[test]
    fn test_capacity_640x480() {
        assert_eq!(reservoir_bytes(640, 480, 25, 10), Some(230_400_000));
    }

    #[test]
    fn test_capacity_800x800() {
        assert_eq!(reservoir_bytes(800, 800, 25, 10), Some(480_000_000));
    }

    #[test]
    fn test_capacity_overflow_is_allocation_failure() {
        let err = Reservoir::reserve(u32::MAX, u32::MAX, u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::AllocationFailure { requested: None }
        ));
    }

    #[test]
    fn test_reserve_exact_capacity() {
        let reservoir = Reservoir::reserve(4, 2, 5, 2).unwrap();
        assert_eq!(reservoir.frame_bytes(), 24);
        assert_eq!(reservoir.capacity_bytes(), 4 * 2 * 3 * 5 * 2);
        assert_eq!(reservoir.capacity_frames(), 10);
        assert_eq!(reservoir.frames_written(), 0);
    }

    // =============================================================
    // Slot claiming
    // =============================================================

    #[test]
    fn test_next_slot_fills_exactly_capacity() {
        let mut reservoir = Reservoir::reserve(3, 3, 4, 2).unwrap();
        let frame = reservoir.frame_bytes();

        for i in 0..8 {
            let offset = reservoir.next_slot().unwrap();
            assert_eq!(offset, i * frame);
            assert!(offset + frame <= reservoir.capacity_bytes());
        }

        let err = reservoir.next_slot().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::OutOfCapacity { capacity_frames: 8 }
        ));
        assert_eq!(reservoir.frames_written(), 8);
    }

    #[test]
    fn test_zero_sized_reservoir_rejects_slots() {
        let mut reservoir = Reservoir::reserve(0, 10, 25, 10).unwrap();
        assert_eq!(reservoir.capacity_frames(), 0);
        assert!(matches!(
            reservoir.next_slot(),
            Err(CaptureError::OutOfCapacity { .. })
        ));
    }

    #[test]
    fn test_discard_last_rolls_back() {
        let mut reservoir = Reservoir::reserve(2, 2, 1, 3).unwrap();
        reservoir.next_slot().unwrap();
        let second = reservoir.next_slot().unwrap();
        reservoir.discard_last();
        assert_eq!(reservoir.frames_written(), 1);
        assert_eq!(reservoir.next_slot().unwrap(), second);
    }

    // =============================================================
    // Dump-phase reading
    // =============================================================

    #[test]
    fn test_next_frame_stops_at_frames_written() {
        let mut reservoir = Reservoir::reserve(1, 1, 10, 1).unwrap();
        for value in [10u8, 20, 30] {
            let offset = reservoir.next_slot().unwrap();
            reservoir.slot_mut(offset).fill(value);
        }

        reservoir.reset_cursor();
        let mut seen = Vec::new();
        while let Some(frame) = reservoir.next_frame() {
            seen.push(frame[0]);
        }
        assert_eq!(seen, vec![10, 20, 30]);
        assert_eq!(reservoir.frame(2), Some(&[30u8, 30, 30][..]));
        assert_eq!(reservoir.frame(3), None);
    }

    // =============================================================
    // Release
    // =============================================================

    #[test]
    fn test_release_is_idempotent() {
        let mut reservoir = Reservoir::reserve(8, 8, 2, 1).unwrap();
        reservoir.next_slot().unwrap();
        reservoir.release();
        reservoir.release();
        assert!(reservoir.is_released());
        assert!(reservoir.frame(0).is_none());
        assert!(matches!(reservoir.next_slot(), Err(CaptureError::Released)));
        drop(reservoir);
    }
}
