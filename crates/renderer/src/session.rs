use std::sync::{Arc, Weak};

use image::imageops::flip_vertical_in_place;
use image::RgbaImage;
use winit::dpi::PhysicalSize;

use crate::backend::{RenderBackend, RowOrder};
use crate::cpu::SoftwareBackend;
use crate::error::RendererError;
use crate::gpu::{Canvas, GpuBackend};
use crate::runtime::{
    BoxedTimeSource, LoopState, PlaybackEvent, PlaybackState, SystemTimeSource, TickOutcome,
};
use crate::source::{FrameSource, VideoFrame};
use crate::surface::{SurfaceEvent, SurfaceEventQueue, SurfaceEventSender, SurfaceSizer};
use crate::types::{ColorSettings, EffectSettings, RendererConfig, SplitPosition};
use crate::uniforms::GradeUniforms;

/// Still image read back from the drawable, top row first.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: RgbaImage,
}

impl CapturedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Externally visible lifecycle of a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererStatus {
    Active,
    /// The context is gone; draws are suppressed until it is restored.
    ContextLost,
    /// A restore attempt failed. The renderer will not draw again.
    RestoreFailed,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Active,
    ContextLost {
        resume_loop: bool,
        restore_failed: bool,
    },
    Disposed,
}

/// One grading session bound to one drawable.
///
/// All parameter setters only stage state; GPU work happens in
/// [`render_frame`](Self::render_frame), [`tick`](Self::tick) and
/// [`capture_frame`](Self::capture_frame).
pub struct GradingRenderer<B: RenderBackend> {
    backend: B,
    config: RendererConfig,
    events: SurfaceEventQueue,
    sizer: SurfaceSizer,
    source: Option<Weak<dyn FrameSource>>,
    color: ColorSettings,
    effects: EffectSettings,
    split: SplitPosition,
    uniforms: GradeUniforms,
    time: BoxedTimeSource,
    playback: PlaybackState,
    loop_state: LoopState,
    lifecycle: Lifecycle,
    dirty: bool,
    last_upload: Option<VideoFrame>,
    frames_rendered: u64,
}

impl GradingRenderer<GpuBackend> {
    /// Acquires an accelerated device for `canvas` and compiles the grading program.
    ///
    /// [`RendererError::Unavailable`] means the platform has no usable GPU; the
    /// caller may fall back to [`GradingRenderer::software`].
    pub fn initialize(canvas: Canvas, config: RendererConfig) -> Result<Self, RendererError> {
        let backend = GpuBackend::new(canvas, &config)?;
        Ok(Self::with_backend(backend, config))
    }
}

impl GradingRenderer<SoftwareBackend> {
    pub fn software(config: RendererConfig) -> Self {
        let backend = SoftwareBackend::new(config.initial_size);
        Self::with_backend(backend, config)
    }
}

impl<B: RenderBackend> GradingRenderer<B> {
    pub fn with_backend(mut backend: B, config: RendererConfig) -> Self {
        let events = SurfaceEventQueue::new();
        backend.attach_events(events.sender());
        let size = backend.size();
        let sizer = SurfaceSizer::new(config.max_pixel_ratio, size);
        tracing::debug!(
            backend = backend.label(),
            width = size.width,
            height = size.height,
            "created grading renderer"
        );
        Self {
            backend,
            config,
            events,
            sizer,
            source: None,
            color: ColorSettings::default(),
            effects: EffectSettings::default(),
            split: SplitPosition::Disabled,
            uniforms: GradeUniforms::new(size),
            time: Box::new(SystemTimeSource::new()),
            playback: PlaybackState::Idle,
            loop_state: LoopState::Stopped,
            lifecycle: Lifecycle::Active,
            dirty: true,
            last_upload: None,
            frames_rendered: 0,
        }
    }

    /// Replaces the clock feeding the grain animation.
    pub fn with_time_source(mut self, time: BoxedTimeSource) -> Self {
        self.time = time;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Handle for resize observers and other asynchronous producers.
    pub fn event_sender(&self) -> SurfaceEventSender {
        self.events.sender()
    }

    pub fn status(&self) -> RendererStatus {
        match self.lifecycle {
            Lifecycle::Active => RendererStatus::Active,
            Lifecycle::ContextLost {
                restore_failed: false,
                ..
            } => RendererStatus::ContextLost,
            Lifecycle::ContextLost {
                restore_failed: true,
                ..
            } => RendererStatus::RestoreFailed,
            Lifecycle::Disposed => RendererStatus::Disposed,
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.backend.size()
    }

    pub fn color_settings(&self) -> &ColorSettings {
        &self.color
    }

    pub fn effect_settings(&self) -> &EffectSettings {
        &self.effects
    }

    pub fn split_position(&self) -> SplitPosition {
        self.split
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Records a weak reference to `source`, replacing any previous one.
    pub fn set_video_source(&mut self, source: &Arc<dyn FrameSource>) {
        if self.is_disposed() {
            return;
        }
        self.source = Some(Arc::downgrade(source));
        self.last_upload = None;
        self.dirty = true;
    }

    pub fn clear_video_source(&mut self) {
        self.source = None;
        self.last_upload = None;
        self.dirty = true;
    }

    pub fn update_color_settings(&mut self, settings: &ColorSettings) {
        if self.is_disposed() || self.color == *settings {
            return;
        }
        self.color = *settings;
        self.uniforms.set_color(settings);
        self.dirty = true;
    }

    pub fn update_effects(&mut self, settings: &EffectSettings) {
        if self.is_disposed() || self.effects == *settings {
            return;
        }
        self.effects = *settings;
        self.uniforms.set_effects(settings);
        self.dirty = true;
    }

    pub fn set_split_position(&mut self, split: SplitPosition) {
        if self.is_disposed() || self.split == split {
            return;
        }
        self.split = split;
        self.uniforms.set_split(split);
        self.dirty = true;
    }

    /// Feeds a play/pause/ended/seeked notification from the source's owner.
    pub fn notify_playback(&mut self, event: PlaybackEvent) {
        let next = self.playback.on_event(event);
        if next != self.playback {
            tracing::debug!(from = ?self.playback, to = ?next, "playback state changed");
        }
        self.playback = next;
        if !matches!(event, PlaybackEvent::Play) {
            self.dirty = true;
        }
    }

    /// Applies an observed display size. Returns `true` when the backing store was reallocated.
    pub fn observe_resize(&mut self, width: f64, height: f64, scale_factor: f64) -> bool {
        if self.is_disposed() {
            return false;
        }
        match self.sizer.observe(width, height, scale_factor) {
            Some(size) => {
                self.backend.resize(size);
                self.uniforms.set_resolution(size);
                self.dirty = true;
                tracing::debug!(width = size.width, height = size.height, "resized drawable");
                true
            }
            None => false,
        }
    }

    pub fn start_render_loop(&mut self) {
        match &mut self.lifecycle {
            Lifecycle::Active => self.loop_state = LoopState::Running,
            Lifecycle::ContextLost { resume_loop, .. } => *resume_loop = true,
            Lifecycle::Disposed => {}
        }
    }

    pub fn stop_render_loop(&mut self) {
        self.loop_state = LoopState::Stopped;
        if let Lifecycle::ContextLost { resume_loop, .. } = &mut self.lifecycle {
            *resume_loop = false;
        }
    }

    /// Draws the current frame with the staged parameters.
    ///
    /// Returns `Ok(false)` when nothing was drawn: no source, a source that is
    /// not ready, an empty drawable, or a lost context.
    pub fn render_frame(&mut self) -> Result<bool, RendererError> {
        self.process_events();
        match self.lifecycle {
            Lifecycle::Disposed => return Err(RendererError::Disposed),
            Lifecycle::ContextLost { .. } => return Ok(false),
            Lifecycle::Active => {}
        }
        let size = self.backend.size();
        if size.width == 0 || size.height == 0 {
            return Ok(false);
        }
        let Some(frame) = self.current_frame() else {
            return Ok(false);
        };

        let drawn = self
            .prepare(Some(&frame))
            .and_then(|()| self.backend.draw());
        match drawn {
            Ok(()) => {
                self.dirty = false;
                self.frames_rendered += 1;
                Ok(true)
            }
            Err(RendererError::ContextLost) => {
                self.enter_context_lost("backend reported a lost context");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// One host animation callback.
    ///
    /// While playing every tick draws; while idle only staged changes draw.
    /// Failures are logged, never returned.
    pub fn tick(&mut self) -> TickOutcome {
        self.process_events();
        if self.lifecycle != Lifecycle::Active || self.loop_state == LoopState::Stopped {
            return TickOutcome::Suspended;
        }
        if !self.playback.redraws_continuously() && !self.dirty {
            return TickOutcome::Skipped;
        }
        match self.render_frame() {
            Ok(true) => TickOutcome::Rendered,
            Ok(false) => TickOutcome::Skipped,
            Err(err) => {
                tracing::warn!(error = %err, "frame render failed");
                TickOutcome::Suspended
            }
        }
    }

    /// Forces a render and reads the result back as a top-down image.
    ///
    /// Returns `Ok(None)` while the drawable has no area.
    pub fn capture_frame(&mut self) -> Result<Option<CapturedFrame>, RendererError> {
        self.process_events();
        match self.lifecycle {
            Lifecycle::Disposed => return Err(RendererError::Disposed),
            Lifecycle::ContextLost { .. } => return Err(RendererError::ContextLost),
            Lifecycle::Active => {}
        }
        let size = self.backend.size();
        if size.width == 0 || size.height == 0 {
            return Ok(None);
        }

        let frame = self.current_frame();
        let pixels = self
            .prepare(frame.as_ref())
            .and_then(|()| self.backend.read_pixels());
        let mut image = match pixels {
            Ok(image) => image,
            Err(RendererError::ContextLost) => {
                self.enter_context_lost("backend reported a lost context");
                return Err(RendererError::ContextLost);
            }
            Err(err) => return Err(err),
        };
        if self.backend.row_order() == RowOrder::BottomUp {
            flip_vertical_in_place(&mut image);
        }
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            "captured frame"
        );
        Ok(Some(CapturedFrame { image }))
    }

    /// Rebuilds device resources after a loss and reapplies the staged state.
    pub fn restore_context(&mut self) -> Result<(), RendererError> {
        let resume_loop = match self.lifecycle {
            Lifecycle::Disposed => return Err(RendererError::Disposed),
            Lifecycle::Active => return Ok(()),
            Lifecycle::ContextLost { resume_loop, .. } => resume_loop,
        };

        let restored = self
            .backend
            .restore()
            .and_then(|()| self.backend.write_uniforms(&self.uniforms));
        match restored {
            Ok(()) => {
                self.lifecycle = Lifecycle::Active;
                self.last_upload = None;
                self.dirty = true;
                if resume_loop {
                    self.loop_state = LoopState::Running;
                }
                tracing::info!(backend = self.backend.label(), "rendering context restored");
                Ok(())
            }
            Err(err) => {
                self.lifecycle = Lifecycle::ContextLost {
                    resume_loop,
                    restore_failed: true,
                };
                tracing::warn!(error = %err, "failed to restore rendering context");
                Err(err)
            }
        }
    }

    /// Stops the loop, drops the source and releases every device resource.
    pub fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }
        self.loop_state = LoopState::Stopped;
        self.source = None;
        self.last_upload = None;
        self.backend.release();
        self.events.drain();
        self.lifecycle = Lifecycle::Disposed;
        tracing::debug!(
            backend = self.backend.label(),
            frames = self.frames_rendered,
            "disposed grading renderer"
        );
    }

    /// Applies queued surface events without drawing.
    pub fn poll_events(&mut self) {
        self.process_events();
    }

    fn is_disposed(&self) -> bool {
        self.lifecycle == Lifecycle::Disposed
    }

    fn process_events(&mut self) {
        if self.is_disposed() {
            return;
        }
        for event in self.events.drain() {
            match event {
                SurfaceEvent::Resized {
                    width,
                    height,
                    scale_factor,
                } => {
                    self.observe_resize(width, height, scale_factor);
                }
                SurfaceEvent::ContextLost { reason } => self.enter_context_lost(&reason),
                SurfaceEvent::ContextRestored => {
                    // Failure is recorded in the lifecycle for the host to act on.
                    let _ = self.restore_context();
                }
            }
        }
    }

    fn enter_context_lost(&mut self, reason: &str) {
        if self.lifecycle != Lifecycle::Active {
            return;
        }
        self.lifecycle = Lifecycle::ContextLost {
            resume_loop: self.loop_state == LoopState::Running,
            restore_failed: false,
        };
        self.loop_state = LoopState::Stopped;
        self.last_upload = None;
        tracing::warn!(reason, "rendering context lost; suspending draws");
    }

    fn current_frame(&mut self) -> Option<VideoFrame> {
        let weak = self.source.as_ref()?;
        let Some(source) = weak.upgrade() else {
            tracing::debug!("frame source was dropped");
            self.source = None;
            self.last_upload = None;
            return None;
        };
        if !source.ready_state().can_present() {
            return None;
        }
        source.current_frame().filter(|frame| !frame.is_empty())
    }

    fn prepare(&mut self, frame: Option<&VideoFrame>) -> Result<(), RendererError> {
        if let Some(frame) = frame {
            let fresh = self
                .last_upload
                .as_ref()
                .is_none_or(|last| !last.same_content(frame));
            if fresh {
                self.backend.upload_frame(frame)?;
                self.last_upload = Some(frame.clone());
            }
        }
        let sample = self.time.sample();
        self.uniforms.set_time(sample.seconds);
        self.uniforms.set_resolution(self.backend.size());
        self.backend.write_uniforms(&self.uniforms)
    }
}

impl<B: RenderBackend> Drop for GradingRenderer<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
