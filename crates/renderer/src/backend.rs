use image::RgbaImage;
use winit::dpi::PhysicalSize;

use crate::error::RendererError;
use crate::source::VideoFrame;
use crate::surface::SurfaceEventSender;
use crate::uniforms::GradeUniforms;

/// Row order of the pixels returned by [`RenderBackend::read_pixels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    TopDown,
    /// First row is the bottom of the image, as with GL framebuffers.
    BottomUp,
}

/// Device-facing half of the renderer.
///
/// A backend owns one drawable, one frame texture and one compiled program.
/// [`GradingRenderer`](crate::GradingRenderer) decides when to call into it;
/// backends never schedule work on their own.
pub trait RenderBackend {
    /// Short name used in logs.
    fn label(&self) -> &'static str;

    fn row_order(&self) -> RowOrder;

    /// Current drawable size in physical pixels.
    fn size(&self) -> PhysicalSize<u32>;

    /// Reallocates the drawable and viewport. Only called when the size changed.
    fn resize(&mut self, size: PhysicalSize<u32>);

    /// Hands the backend a sender for asynchronous loss notifications.
    fn attach_events(&mut self, events: SurfaceEventSender);

    /// Copies `frame` into the frame texture, growing it when the dimensions change.
    fn upload_frame(&mut self, frame: &VideoFrame) -> Result<(), RendererError>;

    fn write_uniforms(&mut self, uniforms: &GradeUniforms) -> Result<(), RendererError>;

    /// Draws the full-screen pass into the drawable.
    fn draw(&mut self) -> Result<(), RendererError>;

    /// Renders into a readable target and returns its pixels in [`Self::row_order`].
    fn read_pixels(&mut self) -> Result<RgbaImage, RendererError>;

    /// Reacquires the device after a loss: recompiles the program and
    /// recreates the frame texture. Uniform contents are not preserved.
    fn restore(&mut self) -> Result<(), RendererError>;

    /// Releases every device resource. Safe to call more than once.
    fn release(&mut self);
}
