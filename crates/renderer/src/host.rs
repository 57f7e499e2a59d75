//! Binds a [`GradingRenderer`] to a host UI lifecycle.
//!
//! The host owns the drawable and the frame source. It creates the renderer
//! on mount, forwards UI state, and recreates the renderer when a lost
//! context cannot be restored in place.

use std::sync::{Arc, Weak};

use crate::backend::RenderBackend;
use crate::error::RendererError;
use crate::runtime::{PlaybackEvent, PlaybackState, TickOutcome};
use crate::session::{CapturedFrame, GradingRenderer, RendererStatus};
use crate::source::FrameSource;
use crate::types::{ColorSettings, EffectSettings, SplitPosition};

/// Builds a fresh renderer for the host's drawable.
pub type RendererFactory<B> = Box<dyn FnMut() -> Result<GradingRenderer<B>, RendererError>>;

/// Everything the UI controls, handed over as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GradeState {
    pub color: ColorSettings,
    pub effects: EffectSettings,
    pub split: SplitPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostStatus {
    #[default]
    Unmounted,
    Active,
    /// No renderer could be created; the host should show the unmodified source.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DisplaySize {
    width: f64,
    height: f64,
    scale_factor: f64,
}

pub struct RendererHost<B: RenderBackend> {
    factory: Option<RendererFactory<B>>,
    renderer: Option<GradingRenderer<B>>,
    state: GradeState,
    applied: Option<GradeState>,
    source: Option<Weak<dyn FrameSource>>,
    playback: PlaybackState,
    display: Option<DisplaySize>,
    status: HostStatus,
    recreations: u32,
}

impl<B: RenderBackend> Default for RendererHost<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: RenderBackend> RendererHost<B> {
    pub fn new() -> Self {
        Self {
            factory: None,
            renderer: None,
            state: GradeState::default(),
            applied: None,
            source: None,
            playback: PlaybackState::Idle,
            display: None,
            status: HostStatus::Unmounted,
            recreations: 0,
        }
    }

    pub fn status(&self) -> HostStatus {
        self.status
    }

    pub fn renderer(&self) -> Option<&GradingRenderer<B>> {
        self.renderer.as_ref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut GradingRenderer<B>> {
        self.renderer.as_mut()
    }

    /// How many times the renderer was rebuilt after an unrecoverable loss.
    pub fn recreations(&self) -> u32 {
        self.recreations
    }

    pub fn state(&self) -> &GradeState {
        &self.state
    }

    /// Creates the renderer and starts its loop.
    ///
    /// A failure is reported here once; the host then stays degraded.
    pub fn mount<F>(&mut self, factory: F) -> Result<(), RendererError>
    where
        F: FnMut() -> Result<GradingRenderer<B>, RendererError> + 'static,
    {
        self.unmount();
        self.factory = Some(Box::new(factory));
        match self.build_renderer() {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "grading renderer unavailable; showing source ungraded"
                );
                self.status = HostStatus::Degraded;
                Err(err)
            }
        }
    }

    pub fn unmount(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
        }
        self.factory = None;
        self.applied = None;
        self.status = HostStatus::Unmounted;
    }

    /// Forwards only the parts of `state` that changed since the last call.
    pub fn apply(&mut self, state: &GradeState) {
        self.state = *state;
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let previous = self.applied;
        if previous.is_none_or(|applied| applied.color != state.color) {
            renderer.update_color_settings(&state.color);
        }
        if previous.is_none_or(|applied| applied.effects != state.effects) {
            renderer.update_effects(&state.effects);
        }
        if previous.is_none_or(|applied| applied.split != state.split) {
            renderer.set_split_position(state.split);
        }
        self.applied = Some(*state);
    }

    pub fn set_source(&mut self, source: &Arc<dyn FrameSource>) {
        self.source = Some(Arc::downgrade(source));
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_video_source(source);
        }
    }

    pub fn clear_source(&mut self) {
        self.source = None;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.clear_video_source();
        }
    }

    pub fn notify_playback(&mut self, event: PlaybackEvent) {
        self.playback = self.playback.on_event(event);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.notify_playback(event);
        }
    }

    pub fn observe_resize(&mut self, width: f64, height: f64, scale_factor: f64) -> bool {
        self.display = Some(DisplaySize {
            width,
            height,
            scale_factor,
        });
        self.renderer
            .as_mut()
            .is_some_and(|renderer| renderer.observe_resize(width, height, scale_factor))
    }

    /// Captures the current graded frame; `None` while degraded or empty.
    pub fn capture(&mut self) -> Result<Option<CapturedFrame>, RendererError> {
        self.recover();
        match self.renderer.as_mut() {
            Some(renderer) => renderer.capture_frame(),
            None => Ok(None),
        }
    }

    /// Host animation callback: recovers from context loss, then ticks the renderer.
    pub fn tick(&mut self) -> TickOutcome {
        self.recover();
        match self.renderer.as_mut() {
            Some(renderer) => renderer.tick(),
            None => TickOutcome::Suspended,
        }
    }

    fn recover(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        renderer.poll_events();
        let needs_rebuild = match renderer.status() {
            RendererStatus::Active | RendererStatus::Disposed => false,
            RendererStatus::ContextLost => renderer.restore_context().is_err(),
            RendererStatus::RestoreFailed => true,
        };
        if !needs_rebuild {
            return;
        }

        tracing::warn!("context could not be restored; recreating renderer");
        if let Some(mut stale) = self.renderer.take() {
            stale.dispose();
        }
        self.applied = None;
        match self.build_renderer() {
            Ok(()) => self.recreations += 1,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "failed to recreate renderer; showing source ungraded"
                );
                self.status = HostStatus::Degraded;
            }
        }
    }

    fn build_renderer(&mut self) -> Result<(), RendererError> {
        let factory = self.factory.as_mut().ok_or_else(|| {
            RendererError::Unavailable("renderer host is not mounted".to_string())
        })?;
        let mut renderer = factory()?;

        if let Some(display) = self.display {
            renderer.observe_resize(display.width, display.height, display.scale_factor);
        }
        if let Some(source) = self.source.as_ref().and_then(Weak::upgrade) {
            renderer.set_video_source(&source);
        }
        if self.playback == PlaybackState::Playing {
            renderer.notify_playback(PlaybackEvent::Play);
        }
        renderer.start_render_loop();
        self.renderer = Some(renderer);
        self.status = HostStatus::Active;

        let state = self.state;
        self.apply(&state);
        Ok(())
    }
}

impl<B: RenderBackend> Drop for RendererHost<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}
