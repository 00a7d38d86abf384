//! Frame dumping: reservoir -> numbered image files.
//!
//! Frames are written in capture order as `<prefix>_<index:03>.<ext>`.
//! A frame that fails to encode or write is reported and skipped; the rest
//! of the sequence is still written.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::reservoir::{BYTES_PER_PIXEL, Reservoir, RowOrder};

/// Default file name prefix for dumped frames.
pub const DEFAULT_FRAME_PREFIX: &str = "video_frame";

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Image format for dumped frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// Lossless PNG (default)
    #[default]
    Png,
    /// Lossy JPEG
    Jpeg,
}

impl FrameFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            FrameFormat::Png => "png",
            FrameFormat::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFormat::Png => f.write_str("png"),
            FrameFormat::Jpeg => f.write_str("jpeg"),
        }
    }
}

impl FromStr for FrameFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(FrameFormat::Png),
            "jpg" | "jpeg" => Ok(FrameFormat::Jpeg),
            other => Err(format!("unsupported frame format '{other}' (expected png or jpeg)")),
        }
    }
}

/// Where and how to write dumped frames.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub out_dir: PathBuf,
    pub prefix: String,
    pub format: FrameFormat,
    pub jpeg_quality: u8,
}

impl DumpOptions {
    /// PNG frames named `video_frame_NNN.png` in `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            prefix: DEFAULT_FRAME_PREFIX.to_string(),
            format: FrameFormat::Png,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Path of frame `index` (zero-padded to at least three digits).
    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.out_dir.join(format!(
            "{}_{:03}.{}",
            self.prefix,
            index,
            self.format.extension()
        ))
    }
}

/// A single frame that could not be dumped.
#[derive(Debug)]
pub struct FrameFailure {
    pub index: usize,
    pub error: CaptureError,
}

/// Outcome of a dump pass.
#[derive(Debug, Default)]
pub struct DumpReport {
    /// Files written successfully, in frame order.
    pub written: Vec<PathBuf>,
    /// Frames that failed to encode or write.
    pub failures: Vec<FrameFailure>,
}

impl DumpReport {
    pub fn written_count(&self) -> usize {
        self.written.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Reverse the order of `height` rows of `row_bytes` bytes each.
///
/// Converts between bottom-up (backbuffer) and top-down (image file) layouts.
/// Bytes past the last row are ignored.
///
/// # Panics
///
/// Panics if `buffer` holds fewer than `row_bytes * height` bytes.
pub fn flip_rows(buffer: &[u8], row_bytes: usize, height: usize) -> Vec<u8> {
    if row_bytes == 0 || height == 0 {
        return Vec::new();
    }
    let len = row_bytes
        .checked_mul(height)
        .filter(|&len| len <= buffer.len());
    let Some(len) = len else {
        panic!(
            "flip_rows: buffer holds {} bytes, {} rows of {} bytes requested",
            buffer.len(),
            height,
            row_bytes
        );
    };
    let rows = &buffer[..len];
    let mut flipped = Vec::with_capacity(rows.len());
    for row in rows.chunks_exact(row_bytes).rev() {
        flipped.extend_from_slice(row);
    }
    flipped
}

/// Write every captured frame to disk, then release the reservoir.
///
/// Only the frames actually written by the capture path are dumped, so a
/// session stopped early produces a short sequence rather than stale data.
/// The reservoir is released on every path, including when the output
/// directory cannot be created.
pub fn dump_all(
    mut reservoir: Reservoir,
    options: &DumpOptions,
) -> Result<DumpReport, CaptureError> {
    let result = dump_frames(&mut reservoir, options);
    reservoir.release();
    result
}

fn dump_frames(
    reservoir: &mut Reservoir,
    options: &DumpOptions,
) -> Result<DumpReport, CaptureError> {
    std::fs::create_dir_all(&options.out_dir).map_err(|source| CaptureError::OutputDir {
        path: options.out_dir.clone(),
        source,
    })?;

    let (width, height) = (reservoir.width(), reservoir.height());
    let row_bytes = width as usize * BYTES_PER_PIXEL;
    let flip = reservoir.row_order() == RowOrder::BottomUp;

    tracing::info!(
        "Dumping {} frames to {}",
        reservoir.frames_written(),
        options.out_dir.display()
    );

    let mut report = DumpReport::default();
    reservoir.reset_cursor();
    let mut index = 0usize;
    while let Some(frame) = reservoir.next_frame() {
        let path = options.frame_path(index);
        let result = if flip {
            let top_down = flip_rows(frame, row_bytes, height as usize);
            write_frame(&path, &top_down, width, height, options)
        } else {
            write_frame(&path, frame, width, height, options)
        };

        match result {
            Ok(()) => {
                tracing::debug!("Wrote video frame {}", path.display());
                report.written.push(path);
            }
            Err(error) => {
                tracing::error!("Could not write video frame {}: {}", index, error);
                report.failures.push(FrameFailure { index, error });
            }
        }
        index += 1;
    }

    if report.failures.is_empty() {
        tracing::info!("Video frames dumped: {}", report.written_count());
    } else {
        tracing::warn!(
            "Video frames dumped: {} written, {} failed",
            report.written_count(),
            report.failure_count()
        );
    }

    Ok(report)
}

/// Encode one top-down RGB frame and write it to `path`.
fn write_frame(
    path: &Path,
    pixels: &[u8],
    width: u32,
    height: u32,
    options: &DumpOptions,
) -> Result<(), CaptureError> {
    let encoded = match options.format {
        FrameFormat::Png => encode_png(pixels, width, height),
        FrameFormat::Jpeg => encode_jpeg(pixels, width, height, options.jpeg_quality),
    }
    .map_err(|message| CaptureError::Encode {
        path: path.to_path_buf(),
        message,
    })?;

    std::fs::write(path, encoded).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn encode_png(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
        writer.write_image_data(pixels).map_err(|e| e.to_string())?;
        writer.finish().map_err(|e| e.to_string())?;
    }
    Ok(bytes)
}

fn encode_jpeg(pixels: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder
        .encode(pixels, width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| e.to_string())?;
    Ok(bytes)
}
