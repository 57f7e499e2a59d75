use std::borrow::Cow;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::backend::{RenderBackend, RowOrder};
use crate::error::RendererError;
use crate::source::VideoFrame;
use crate::surface::{SurfaceEventSender, SurfaceSizer};
use crate::types::RendererConfig;
use crate::uniforms::GradeUniforms;

use super::context::GpuContext;
use super::frame::FrameTexture;
use super::pipeline::GradeProgram;
use super::readback::{RenderTarget, TARGET_FORMAT};

/// Drawable the accelerated renderer binds to.
#[derive(Debug, Clone)]
pub enum Canvas {
    /// On-screen window; the renderer presents into its surface.
    Window(Arc<Window>),
    /// Headless target of a fixed physical size.
    Offscreen(PhysicalSize<u32>),
}

/// Everything created from the device; rebuilt wholesale after a loss.
struct GpuResources {
    program: GradeProgram,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    frame: FrameTexture,
    bind_group: wgpu::BindGroup,
    target: Option<RenderTarget>,
}

impl GpuResources {
    fn new(context: &GpuContext, size: PhysicalSize<u32>) -> Result<Self, RendererError> {
        let device = &context.device;
        let mut program = GradeProgram::new(device)?;
        let draw_format = context
            .surface
            .as_ref()
            .map(|binding| binding.config.format)
            .unwrap_or(TARGET_FORMAT);
        program.pipeline(device, draw_format)?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grade uniforms"),
            size: std::mem::size_of::<GradeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("video frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let frame = FrameTexture::placeholder(device, &context.queue);
        let bind_group = create_bind_group(device, &program, &uniform_buffer, &frame, &sampler);
        let target = context
            .surface
            .is_none()
            .then(|| RenderTarget::new(device, size));

        Ok(Self {
            program,
            uniform_buffer,
            sampler,
            frame,
            bind_group,
            target,
        })
    }

    fn rebuild_bind_group(&mut self, device: &wgpu::Device) {
        self.bind_group = create_bind_group(
            device,
            &self.program,
            &self.uniform_buffer,
            &self.frame,
            &self.sampler,
        );
    }

    fn destroy(&self) {
        self.frame.destroy();
        self.uniform_buffer.destroy();
        if let Some(target) = &self.target {
            target.destroy();
        }
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    program: &GradeProgram,
    uniform_buffer: &wgpu::Buffer,
    frame: &FrameTexture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("grade bind group"),
        layout: &program.bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&frame.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Accelerated backend drawing through wgpu.
pub struct GpuBackend {
    context: Option<GpuContext>,
    resources: Option<GpuResources>,
    size: PhysicalSize<u32>,
    released: bool,
}

impl GpuBackend {
    pub fn new(canvas: Canvas, config: &RendererConfig) -> Result<Self, RendererError> {
        let (window, size) = match canvas {
            Canvas::Window(window) => {
                let scale = window.scale_factor();
                let logical = window.inner_size().to_logical::<f64>(scale);
                let sizer = SurfaceSizer::new(config.max_pixel_ratio, config.initial_size);
                let size = sizer.physical_size(logical.width, logical.height, scale);
                (Some(window), size)
            }
            Canvas::Offscreen(size) => (None, size),
        };

        let context = GpuContext::new(window, config.power_preference)?;
        let limit = context.max_texture_dimension();
        if size.width > limit || size.height > limit {
            return Err(RendererError::Unavailable(format!(
                "GPU max texture dimension is {limit}, requested canvas is {}x{}",
                size.width, size.height
            )));
        }
        let resources = GpuResources::new(&context, size)?;
        tracing::info!(
            width = size.width,
            height = size.height,
            windowed = context.surface.is_some(),
            "initialised GPU grading backend"
        );

        Ok(Self {
            context: Some(context),
            resources: Some(resources),
            size,
            released: false,
        })
    }

    pub fn is_lost(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|context| context.loss.is_lost())
    }

    fn parts(&mut self) -> Result<(&mut GpuContext, &mut GpuResources), RendererError> {
        if self.released {
            return Err(RendererError::Disposed);
        }
        match (self.context.as_mut(), self.resources.as_mut()) {
            (Some(context), Some(resources)) if !context.loss.is_lost() => Ok((context, resources)),
            _ => Err(RendererError::ContextLost),
        }
    }
}

fn encode_pass(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    resources: &mut GpuResources,
    view: &wgpu::TextureView,
    format: wgpu::TextureFormat,
) -> Result<(), RendererError> {
    let pipeline = resources.program.pipeline(device, format)?;
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("grade encoder"),
    });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("grade pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &resources.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
    queue.submit(std::iter::once(encoder.finish()));
    Ok(())
}

fn fit_to_limit(frame: &VideoFrame, limit: u32) -> Cow<'_, VideoFrame> {
    let longest = frame.width().max(frame.height());
    if longest <= limit {
        return Cow::Borrowed(frame);
    }
    let scale = limit as f64 / longest as f64;
    let width = ((frame.width() as f64 * scale).floor() as u32).max(1);
    let height = ((frame.height() as f64 * scale).floor() as u32).max(1);
    tracing::warn!(
        source_width = frame.width(),
        source_height = frame.height(),
        width,
        height,
        "frame exceeds GPU texture limit; downscaling"
    );
    let scaled: RgbaImage = imageops::resize(frame.pixels(), width, height, FilterType::Triangle);
    Cow::Owned(VideoFrame::new(Arc::new(scaled), frame.sequence()))
}

impl RenderBackend for GpuBackend {
    fn label(&self) -> &'static str {
        "wgpu"
    }

    fn row_order(&self) -> RowOrder {
        RowOrder::TopDown
    }

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.size = size;
        let (Some(context), Some(resources)) = (self.context.as_mut(), self.resources.as_mut())
        else {
            return;
        };
        if let Some(binding) = context.surface.as_mut() {
            binding.reconfigure(&context.device);
            if let Some(target) = resources.target.take() {
                target.destroy();
            }
        } else if size.width > 0 && size.height > 0 {
            if let Some(target) = resources.target.take() {
                target.destroy();
            }
            resources.target = Some(RenderTarget::new(&context.device, size));
        }
        tracing::debug!(width = size.width, height = size.height, "resized GPU drawable");
    }

    fn attach_events(&mut self, events: SurfaceEventSender) {
        if let Some(context) = &self.context {
            context.loss.attach(events);
        }
    }

    fn upload_frame(&mut self, frame: &VideoFrame) -> Result<(), RendererError> {
        let (context, resources) = self.parts()?;
        let frame = fit_to_limit(frame, context.max_texture_dimension());
        if resources.frame.upload(&context.device, &context.queue, &frame) {
            resources.rebuild_bind_group(&context.device);
        }
        Ok(())
    }

    fn write_uniforms(&mut self, uniforms: &GradeUniforms) -> Result<(), RendererError> {
        let (context, resources) = self.parts()?;
        context
            .queue
            .write_buffer(&resources.uniform_buffer, 0, uniforms.as_bytes());
        Ok(())
    }

    fn draw(&mut self) -> Result<(), RendererError> {
        let size = self.size;
        let (context, resources) = self.parts()?;
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        match context.surface.as_mut() {
            Some(binding) => {
                let frame = match binding.surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        binding.reconfigure(&context.device);
                        return Ok(());
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to acquire surface texture");
                        return Ok(());
                    }
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let format = binding.config.format;
                encode_pass(&context.device, &context.queue, resources, &view, format)?;
                frame.present();
            }
            None => {
                let Some(target) = resources.target.take() else {
                    return Ok(());
                };
                let result = encode_pass(
                    &context.device,
                    &context.queue,
                    resources,
                    &target.view,
                    TARGET_FORMAT,
                );
                resources.target = Some(target);
                result?;
            }
        }
        Ok(())
    }

    fn read_pixels(&mut self) -> Result<RgbaImage, RendererError> {
        let size = self.size;
        let (context, resources) = self.parts()?;
        let target = match resources.target.take() {
            Some(target) if target.size == size => target,
            stale => {
                if let Some(stale) = stale {
                    stale.destroy();
                }
                RenderTarget::new(&context.device, size)
            }
        };
        let drawn = encode_pass(
            &context.device,
            &context.queue,
            resources,
            &target.view,
            TARGET_FORMAT,
        );
        let pixels = drawn.and_then(|()| target.read(&context.device, &context.queue));
        resources.target = Some(target);
        pixels
    }

    fn restore(&mut self) -> Result<(), RendererError> {
        if self.released {
            return Err(RendererError::Disposed);
        }
        if let Some(stale) = self.resources.take() {
            stale.destroy();
        }
        let context = self.context.as_mut().ok_or_else(|| {
            RendererError::Unavailable("GPU context was never created".to_string())
        })?;
        context.reacquire()?;
        self.resources = Some(GpuResources::new(context, self.size)?);
        tracing::info!("GPU context restored");
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(resources) = self.resources.take() {
            resources.destroy();
        }
        if let Some(context) = self.context.take() {
            context.loss.detach();
        }
        tracing::debug!("released GPU grading backend");
    }
}
