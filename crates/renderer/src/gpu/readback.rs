use image::RgbaImage;
use winit::dpi::PhysicalSize;

use crate::error::RendererError;

pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Offscreen colour target that can be copied back to the CPU.
pub(crate) struct RenderTarget {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: PhysicalSize<u32>,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, size: PhysicalSize<u32>) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("grade render target"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            size,
        }
    }

    pub fn destroy(&self) {
        self.texture.destroy();
    }

    /// Copies the target into a top-down RGBA image, blocking until the GPU is done.
    pub fn read(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<RgbaImage, RendererError> {
        let width = self.size.width;
        let height = self.size.height;
        let row_bytes = width
            .checked_mul(4)
            .ok_or_else(|| RendererError::Readback("target width overflow".to_string()))?;
        let padded_row_bytes = align_to(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer_size = u64::from(padded_row_bytes) * u64::from(height);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grade readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| RendererError::Readback(format!("device poll failed: {err}")))?;
        rx.recv()
            .map_err(|_| RendererError::Readback("map callback dropped".to_string()))?
            .map_err(|err| RendererError::Readback(format!("buffer map failed: {err}")))?;

        let mapped = slice.get_mapped_range();
        let pixels = strip_row_padding(
            &mapped,
            row_bytes as usize,
            padded_row_bytes as usize,
            height as usize,
        );
        drop(mapped);
        buffer.unmap();
        buffer.destroy();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RendererError::Readback("readback size mismatch".to_string()))
    }
}

pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

fn strip_row_padding(
    data: &[u8],
    row_bytes: usize,
    padded_row_bytes: usize,
    rows: usize,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(row_bytes * rows);
    for row in 0..rows {
        let start = row * padded_row_bytes;
        out.extend_from_slice(&data[start..start + row_bytes]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(align_to(4, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(1284, 256), 1536);
    }

    #[test]
    fn padding_is_stripped_per_row() {
        let data = [1, 2, 0, 0, 3, 4, 0, 0];
        assert_eq!(strip_row_padding(&data, 2, 4, 2), vec![1, 2, 3, 4]);
    }
}
