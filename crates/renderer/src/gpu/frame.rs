use crate::source::VideoFrame;

pub(crate) const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// The single texture holding the current video frame.
pub(crate) struct FrameTexture {
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl FrameTexture {
    /// Creates a 1x1 black placeholder until the first frame arrives.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let frame = Self::allocate(device, 1, 1);
        queue.write_texture(
            frame.copy_target(),
            &[0, 0, 0, 255],
            frame.layout(),
            frame.extent(),
        );
        frame
    }

    fn allocate(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("video frame texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Uploads `frame`, reallocating when its dimensions changed.
    ///
    /// Returns `true` when the texture was replaced and bind groups
    /// referencing the old view must be rebuilt.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &VideoFrame,
    ) -> bool {
        let reallocated = frame.width() != self.width || frame.height() != self.height;
        if reallocated {
            self.texture.destroy();
            *self = Self::allocate(device, frame.width(), frame.height());
        }
        queue.write_texture(
            self.copy_target(),
            frame.pixels().as_raw(),
            self.layout(),
            self.extent(),
        );
        reallocated
    }

    pub fn destroy(&self) {
        self.texture.destroy();
    }

    fn copy_target(&self) -> wgpu::TexelCopyTextureInfo<'_> {
        wgpu::TexelCopyTextureInfo {
            texture: &self.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        }
    }

    fn layout(&self) -> wgpu::TexelCopyBufferLayout {
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * self.width),
            rows_per_image: Some(self.height),
        }
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}
