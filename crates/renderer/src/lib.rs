//! Real-time colour grading for video frames.
//!
//! A [`GradingRenderer`] takes frames from a host-owned [`FrameSource`],
//! uploads them to a backend and draws them through a single grading pass
//! (lift/gamma/gain, contrast, saturation, white balance, tone ranges, film
//! grain, vignette, before/after split). The flow is:
//!
//! ```text
//!   FrameSource ──▶ GradingRenderer::tick ──▶ prepare() ──▶ GradeUniforms
//!                          ▲                       │
//!   SurfaceEvent queue ────┘                       └─▶ RenderBackend::draw
//! ```
//!
//! Two backends implement [`RenderBackend`]: [`GpuBackend`] drives wgpu and
//! presents into a winit window or an offscreen target, while
//! [`SoftwareBackend`] evaluates the same pass on the CPU for tests and
//! headless machines. [`RendererHost`] ties a renderer to a UI lifecycle and
//! recreates it when a lost context cannot be restored.

mod backend;
mod compile;
mod cpu;
mod error;
mod gpu;
pub mod grade;
mod host;
mod runtime;
mod session;
mod source;
mod surface;
mod types;
mod uniforms;
mod window;

pub use backend::{RenderBackend, RowOrder};
pub use cpu::{SoftwareBackend, SoftwareLossHandle, SoftwareStats};
pub use error::RendererError;
pub use gpu::{Canvas, GpuBackend};
pub use host::{GradeState, HostStatus, RendererFactory, RendererHost};
pub use runtime::{
    BoxedTimeSource, FixedTimeSource, LoopState, PlaybackEvent, PlaybackState, SteppedTimeSource,
    SystemTimeSource, TickOutcome, TimeSample, TimeSource,
};
pub use session::{CapturedFrame, GradingRenderer, RendererStatus};
pub use source::{FrameSequence, FrameSource, ReadyState, StillFrameSource, VideoFrame};
pub use surface::{SurfaceEvent, SurfaceEventSender, SurfaceSizer};
pub use types::{
    ColorSettings, EffectSettings, GpuPowerPreference, RendererConfig, Rgb, SplitPosition,
    DEFAULT_MAX_PIXEL_RATIO, GAMMA_EPSILON,
};
pub use uniforms::GradeUniforms;
pub use window::{run_preview, PreviewError, PreviewOptions};

pub use winit::dpi::PhysicalSize;
