//! Accelerated backend built on wgpu.
//!
//! - `context` owns the instance, device and optional window surface, and
//!   relays device loss into the renderer's event queue.
//! - `pipeline` compiles the grading program and links one render pipeline
//!   per target format.
//! - `frame` holds the video frame texture.
//! - `readback` owns the copyable offscreen target used for captures and
//!   headless rendering.
//! - `state` glues everything together behind [`RenderBackend`](crate::RenderBackend).

mod context;
mod frame;
mod pipeline;
mod readback;
mod state;

pub use state::{Canvas, GpuBackend};
