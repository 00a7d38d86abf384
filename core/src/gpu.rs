//! Offscreen wgpu render target with CPU readback.
//!
//! The target is a plain `Rgba8Unorm` texture that can be rendered into and
//! copied back through a staging buffer. Readback strips the row padding and
//! the alpha channel so frames land in the reservoir as packed RGB.

use anyhow::{Context, Result};

use crate::error::CaptureError;
use crate::grabber::PixelSource;
use crate::reservoir::{BYTES_PER_PIXEL, RowOrder};

/// Format of the offscreen render target.
pub const RENDER_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Trait for graphics backends whose render target can be captured.
pub trait CaptureSupport {
    /// Get the wgpu device for staging buffer creation.
    fn device(&self) -> &wgpu::Device;

    /// Get the wgpu queue for command submission.
    fn queue(&self) -> &wgpu::Queue;

    /// Get the render target texture.
    fn render_target_texture(&self) -> &wgpu::Texture;

    /// Get the render target dimensions (width, height).
    fn render_target_dimensions(&self) -> (u32, u32);
}

/// Headless render target: no window, no surface.
pub struct OffscreenTarget {
    device: wgpu::Device,
    queue: wgpu::Queue,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    /// Create a device and a `width x height` render target.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("Failed to find suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Capture Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: Default::default(),
            trace: wgpu::Trace::Off,
        }))
        .context("Failed to create GPU device")?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Render Target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RENDER_TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        tracing::info!(
            "Offscreen render target initialized: {}x{}, adapter: {}",
            width,
            height,
            adapter.get_info().name
        );

        Ok(Self {
            device,
            queue,
            texture,
            view,
            width: width.max(1),
            height: height.max(1),
        })
    }

    /// Draw one frame: a clear whose colour cycles with `time` (seconds).
    pub fn render(&mut self, time: f32) {
        let t = time as f64;
        let color = wgpu::Color {
            r: 0.5 + 0.5 * t.sin(),
            g: 0.5 + 0.5 * (t * 0.7 + 2.0).sin(),
            b: 0.5 + 0.5 * (t * 1.3 + 4.0).sin(),
            a: 1.0,
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Capture Frame Encoder"),
            });
        {
            let _render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Capture Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl CaptureSupport for OffscreenTarget {
    fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn render_target_texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    fn render_target_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl PixelSource for OffscreenTarget {
    fn dimensions(&self) -> (u32, u32) {
        self.render_target_dimensions()
    }

    fn row_order(&self) -> RowOrder {
        RowOrder::TopDown
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), CaptureError> {
        read_capture_pixels(&*self, dst).map_err(|e| CaptureError::Source(format!("{e:#}")))
    }
}

/// Copy an RGBA8 texture into `dst` as packed RGB rows, top row first.
///
/// The texture is copied to a staging buffer whose rows are padded to
/// `COPY_BYTES_PER_ROW_ALIGNMENT`; padding and alpha are dropped on the way
/// out. Blocks until the GPU copy completes.
pub fn read_render_target_rgb(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
    dst: &mut [u8],
) -> Result<()> {
    let src_bytes_per_pixel = 4u32;
    let unpadded_bytes_per_row = width * src_bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
    let buffer_size = (padded_bytes_per_row * height) as u64;

    let expected = width as usize * height as usize * BYTES_PER_PIXEL;
    anyhow::ensure!(
        dst.len() == expected,
        "destination holds {} bytes, frame needs {}",
        dst.len(),
        expected
    );
    if expected == 0 {
        return Ok(());
    }

    let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Capture Staging Buffer"),
        size: buffer_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Capture Copy Encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging_buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .context("Failed to poll device")?;

    rx.recv()
        .context("Failed to receive map result")?
        .context("Failed to map staging buffer")?;

    {
        let mapped = slice.get_mapped_range();
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        for (row, out) in dst.chunks_exact_mut(row_bytes).enumerate() {
            let start = row * padded_bytes_per_row as usize;
            let src = &mapped[start..start + unpadded_bytes_per_row as usize];
            for (rgb, rgba) in out
                .chunks_exact_mut(BYTES_PER_PIXEL)
                .zip(src.chunks_exact(src_bytes_per_pixel as usize))
            {
                rgb.copy_from_slice(&rgba[..BYTES_PER_PIXEL]);
            }
        }
    }
    staging_buffer.unmap();

    Ok(())
}

/// Read the render target of a [`CaptureSupport`] backend into `dst`.
pub fn read_capture_pixels<G: CaptureSupport + ?Sized>(graphics: &G, dst: &mut [u8]) -> Result<()> {
    let (width, height) = graphics.render_target_dimensions();
    read_render_target_rgb(
        graphics.device(),
        graphics.queue(),
        graphics.render_target_texture(),
        width,
        height,
        dst,
    )
}
