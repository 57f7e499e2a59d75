//! Unaccelerated backend that evaluates the grading pipeline per pixel.
//!
//! The framebuffer is stored bottom-up like a GL drawable, so captures go
//! through the same row flip as an accelerated readback would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use winit::dpi::PhysicalSize;

use crate::backend::{RenderBackend, RowOrder};
use crate::error::RendererError;
use crate::grade;
use crate::source::VideoFrame;
use crate::surface::{SurfaceEvent, SurfaceEventSender};
use crate::uniforms::GradeUniforms;

/// Resource counters exposed for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftwareStats {
    /// Framebuffer allocations, including the initial one.
    pub allocations: u32,
    pub draws: u32,
    pub uploads: u32,
    /// Program builds, including the initial one.
    pub compiles: u32,
}

#[derive(Debug, Default)]
struct LossFlags {
    lost: AtomicBool,
    fail_restore: AtomicBool,
}

/// Simulates platform context loss for a [`SoftwareBackend`].
#[derive(Debug, Clone)]
pub struct SoftwareLossHandle {
    flags: Arc<LossFlags>,
    events: Option<SurfaceEventSender>,
}

impl SoftwareLossHandle {
    /// Marks the context lost and notifies the renderer.
    pub fn lose(&self, reason: &str) {
        self.flags.lost.store(true, Ordering::SeqCst);
        if let Some(events) = &self.events {
            events.send(SurfaceEvent::ContextLost {
                reason: reason.to_string(),
            });
        }
    }

    /// Announces that the context may be restored.
    pub fn restore(&self) {
        if let Some(events) = &self.events {
            events.send(SurfaceEvent::ContextRestored);
        }
    }

    /// Makes every following restore attempt fail until cleared.
    pub fn set_restore_failure(&self, fail: bool) {
        self.flags.fail_restore.store(fail, Ordering::SeqCst);
    }
}

pub struct SoftwareBackend {
    size: PhysicalSize<u32>,
    framebuffer: RgbaImage,
    texture: Option<Arc<RgbaImage>>,
    uniforms: Option<GradeUniforms>,
    program_ready: bool,
    released: bool,
    flags: Arc<LossFlags>,
    events: Option<SurfaceEventSender>,
    stats: SoftwareStats,
}

impl SoftwareBackend {
    pub fn new(size: PhysicalSize<u32>) -> Self {
        let mut backend = Self {
            size,
            framebuffer: RgbaImage::new(size.width, size.height),
            texture: None,
            uniforms: None,
            program_ready: true,
            released: false,
            flags: Arc::new(LossFlags::default()),
            events: None,
            stats: SoftwareStats::default(),
        };
        backend.stats.allocations = 1;
        backend.stats.compiles = 1;
        backend
    }

    pub fn stats(&self) -> SoftwareStats {
        self.stats
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_lost(&self) -> bool {
        self.flags.lost.load(Ordering::SeqCst)
    }

    /// Loss trigger wired to the renderer this backend is attached to.
    pub fn loss_handle(&self) -> SoftwareLossHandle {
        SoftwareLossHandle {
            flags: Arc::clone(&self.flags),
            events: self.events.clone(),
        }
    }

    fn ensure_usable(&self) -> Result<(), RendererError> {
        if self.released {
            return Err(RendererError::Disposed);
        }
        if self.is_lost() || !self.program_ready {
            return Err(RendererError::ContextLost);
        }
        Ok(())
    }

    fn rasterize(&mut self) -> Result<(), RendererError> {
        self.ensure_usable()?;
        let width = self.size.width;
        let height = self.size.height;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let params = self.uniforms.unwrap_or_else(<GradeUniforms as bytemuck::Zeroable>::zeroed);
        let texture = self.texture.clone();

        for row in 0..height {
            let v = (row as f32 + 0.5) / height as f32;
            for x in 0..width {
                let u = (x as f32 + 0.5) / width as f32;
                let texel = match texture.as_deref() {
                    Some(image) => sample_nearest(image, u, 1.0 - v),
                    None => [0.0; 4],
                };
                let shaded = grade::shade(texel, [u, v], &params);
                self.framebuffer.put_pixel(x, row, to_rgba8(shaded));
            }
        }
        self.stats.draws += 1;
        Ok(())
    }
}

impl RenderBackend for SoftwareBackend {
    fn label(&self) -> &'static str {
        "software"
    }

    fn row_order(&self) -> RowOrder {
        RowOrder::BottomUp
    }

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.size = size;
        self.framebuffer = RgbaImage::new(size.width, size.height);
        self.stats.allocations += 1;
    }

    fn attach_events(&mut self, events: SurfaceEventSender) {
        self.events = Some(events);
    }

    fn upload_frame(&mut self, frame: &VideoFrame) -> Result<(), RendererError> {
        self.ensure_usable()?;
        self.texture = Some(Arc::new(frame.pixels().clone()));
        self.stats.uploads += 1;
        Ok(())
    }

    fn write_uniforms(&mut self, uniforms: &GradeUniforms) -> Result<(), RendererError> {
        self.ensure_usable()?;
        self.uniforms = Some(*uniforms);
        Ok(())
    }

    fn draw(&mut self) -> Result<(), RendererError> {
        self.rasterize()
    }

    fn read_pixels(&mut self) -> Result<RgbaImage, RendererError> {
        self.rasterize()?;
        Ok(self.framebuffer.clone())
    }

    fn restore(&mut self) -> Result<(), RendererError> {
        if self.released {
            return Err(RendererError::Disposed);
        }
        if self.flags.fail_restore.load(Ordering::SeqCst) {
            self.program_ready = false;
            return Err(RendererError::Unavailable(
                "software context could not be restored".to_string(),
            ));
        }
        self.flags.lost.store(false, Ordering::SeqCst);
        self.texture = None;
        self.uniforms = None;
        self.framebuffer = RgbaImage::new(self.size.width, self.size.height);
        self.program_ready = true;
        self.stats.compiles += 1;
        self.stats.allocations += 1;
        tracing::debug!("software context restored");
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.texture = None;
        self.uniforms = None;
        self.framebuffer = RgbaImage::new(0, 0);
        self.events = None;
    }
}

fn sample_nearest(image: &RgbaImage, u: f32, v: f32) -> [f32; 4] {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return [0.0; 4];
    }
    let x = ((u * width as f32) as u32).min(width - 1);
    let y = ((v * height as f32) as u32).min(height - 1);
    let Rgba(px) = *image.get_pixel(x, y);
    px.map(|c| c as f32 / 255.0)
}

fn to_rgba8(color: [f32; 4]) -> Rgba<u8> {
    Rgba(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceEventQueue;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([(x * 60) as u8, (y * 60) as u8, 0, 255]))
    }

    #[test]
    fn framebuffer_is_stored_bottom_up() {
        let mut backend = SoftwareBackend::new(PhysicalSize::new(4, 4));
        backend
            .upload_frame(&VideoFrame::from_image(gradient(4, 4)))
            .unwrap();
        backend
            .write_uniforms(&GradeUniforms::new(PhysicalSize::new(4, 4)))
            .unwrap();
        let pixels = backend.read_pixels().unwrap();
        assert_eq!(pixels.get_pixel(0, 0).0, [0, 180, 0, 255]);
        assert_eq!(pixels.get_pixel(0, 3).0, [0, 0, 0, 255]);
        assert_eq!(backend.stats().draws, 1);
    }

    #[test]
    fn loss_blocks_drawing_until_restored() {
        let queue = SurfaceEventQueue::new();
        let mut backend = SoftwareBackend::new(PhysicalSize::new(2, 2));
        backend.attach_events(queue.sender());
        let handle = backend.loss_handle();

        handle.lose("reset");
        assert!(matches!(backend.draw(), Err(RendererError::ContextLost)));
        assert_eq!(
            queue.drain(),
            vec![SurfaceEvent::ContextLost {
                reason: "reset".into()
            }]
        );

        handle.set_restore_failure(true);
        assert!(backend.restore().is_err());
        handle.set_restore_failure(false);
        backend.restore().unwrap();
        assert!(backend.draw().is_ok());
        assert_eq!(backend.stats().compiles, 2);
    }

    #[test]
    fn release_is_idempotent() {
        let mut backend = SoftwareBackend::new(PhysicalSize::new(2, 2));
        backend.release();
        backend.release();
        assert!(backend.is_released());
        assert!(matches!(backend.draw(), Err(RendererError::Disposed)));
    }
}
