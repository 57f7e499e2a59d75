//! Interactive preview window.
//!
//! Runs a winit event loop on the calling thread and drives a
//! [`RendererHost`] bound to the window surface. Controls:
//!
//! * `Space` toggles playback of the clip
//! * `Left`/`Right` step one frame
//! * `S` toggles the before/after split, left-drag moves it
//! * `C` writes the graded frame as a PNG into the capture directory
//! * `Escape` or closing the window exits

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::error::RendererError;
use crate::gpu::{Canvas, GpuBackend};
use crate::host::{GradeState, HostStatus, RendererHost};
use crate::runtime::PlaybackEvent;
use crate::session::GradingRenderer;
use crate::source::{FrameSequence, FrameSource};
use crate::types::{RendererConfig, SplitPosition};

const DEFAULT_SPLIT: f32 = 0.5;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] EventLoopError),
    #[error("failed to create preview window: {0}")]
    Window(#[from] OsError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
}

/// Settings for [`run_preview`].
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub title: String,
    /// Logical window size.
    pub window_size: (u32, u32),
    pub renderer: RendererConfig,
    pub grade: GradeState,
    pub capture_dir: Option<PathBuf>,
    /// Start playing immediately.
    pub autoplay: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            title: "Grade Preview".to_string(),
            window_size: (1280, 720),
            renderer: RendererConfig::default(),
            grade: GradeState::default(),
            capture_dir: None,
            autoplay: false,
        }
    }
}

struct PreviewState {
    window: Arc<Window>,
    host: RendererHost<GpuBackend>,
    clip: Arc<FrameSequence>,
    grade: GradeState,
    last_split: f32,
    cursor: Option<PhysicalPosition<f64>>,
    dragging: bool,
    capture_dir: Option<PathBuf>,
    captures: u32,
    degraded_reported: bool,
}

impl PreviewState {
    fn sync_size(&mut self) {
        let scale = self.window.scale_factor();
        let logical = self.window.inner_size().to_logical::<f64>(scale);
        if self.host.observe_resize(logical.width, logical.height, scale) {
            self.window.request_redraw();
        }
    }

    fn playback(&mut self, event: PlaybackEvent) {
        self.host.notify_playback(event);
        self.window.request_redraw();
    }

    fn toggle_playback(&mut self) {
        let event = if self.clip.is_playing() {
            self.clip.pause()
        } else {
            self.clip.play(Instant::now())
        };
        tracing::debug!(?event, position = self.clip.position(), "preview playback");
        self.playback(event);
    }

    fn step(&mut self, delta: isize) {
        if self.clip.is_playing() {
            let event = self.clip.pause();
            self.playback(event);
        }
        let event = self.clip.seek_by(delta);
        self.playback(event);
    }

    fn set_split(&mut self, split: SplitPosition) {
        if let SplitPosition::At(fraction) = split {
            self.last_split = fraction;
        }
        self.grade.split = split;
        let grade = self.grade;
        self.host.apply(&grade);
        self.window.request_redraw();
    }

    fn toggle_split(&mut self) {
        let split = if self.grade.split.is_enabled() {
            SplitPosition::Disabled
        } else {
            SplitPosition::At(self.last_split)
        };
        self.set_split(split);
    }

    fn drag_split(&mut self) {
        let (Some(cursor), true) = (self.cursor, self.dragging) else {
            return;
        };
        let width = self.window.inner_size().width;
        if width == 0 {
            return;
        }
        self.set_split(SplitPosition::from_fraction((cursor.x / width as f64) as f32));
    }

    fn capture(&mut self) {
        let Some(dir) = self.capture_dir.clone() else {
            tracing::info!("no capture directory configured; ignoring capture request");
            return;
        };
        let frame = match self.host.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!("nothing to capture yet");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "capture failed");
                return;
            }
        };
        if let Err(err) = std::fs::create_dir_all(&dir) {
            tracing::warn!(
                error = %err,
                dir = %dir.display(),
                "failed to create capture directory"
            );
            return;
        }
        self.captures += 1;
        let path = dir.join(format!("capture-{:04}.png", self.captures));
        match frame.into_image().save(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "captured graded frame"),
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "failed to save capture")
            }
        }
    }

    fn handle_key(&mut self, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed {
            return false;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => return true,
            Key::Named(NamedKey::ArrowLeft) => self.step(-1),
            Key::Named(NamedKey::ArrowRight) => self.step(1),
            _ if event.repeat => {}
            Key::Named(NamedKey::Space) => self.toggle_playback(),
            Key::Character(value) if value.eq_ignore_ascii_case("s") => self.toggle_split(),
            Key::Character(value) if value.eq_ignore_ascii_case("c") => self.capture(),
            _ => {}
        }
        false
    }

    fn redraw(&mut self) {
        if let Some(event) = self.clip.advance(Instant::now()) {
            self.host.notify_playback(event);
        }
        let outcome = self.host.tick();
        tracing::trace!(?outcome, frame = self.clip.position(), "preview tick");
        if self.host.status() == HostStatus::Degraded && !self.degraded_reported {
            self.degraded_reported = true;
            tracing::error!("grading renderer lost for good; preview is frozen");
        }
    }

    fn wants_redraw(&self) -> bool {
        self.host
            .renderer()
            .is_some_and(|renderer| renderer.is_dirty())
    }
}

/// Opens a window and previews `clip` graded with `options.grade` until closed.
///
/// Must be called from the main thread on platforms that require it.
pub fn run_preview(options: PreviewOptions, clip: Arc<FrameSequence>) -> Result<(), PreviewError> {
    let event_loop = EventLoopBuilder::new().build()?;
    let (width, height) = options.window_size;
    let window = WindowBuilder::new()
        .with_title(options.title.as_str())
        .with_inner_size(LogicalSize::new(width, height))
        .build(&event_loop)?;
    let window = Arc::new(window);

    let mut host = RendererHost::new();
    let factory_window = Arc::clone(&window);
    let config = options.renderer.clone();
    host.mount(move || {
        GradingRenderer::initialize(Canvas::Window(Arc::clone(&factory_window)), config.clone())
    })?;

    let source: Arc<dyn FrameSource> = clip.clone();
    host.set_source(&source);
    host.apply(&options.grade);

    let last_split = match options.grade.split {
        SplitPosition::At(fraction) => fraction,
        SplitPosition::Disabled => DEFAULT_SPLIT,
    };
    let mut state = PreviewState {
        window,
        host,
        clip,
        grade: options.grade,
        last_split,
        cursor: None,
        dragging: false,
        capture_dir: options.capture_dir,
        captures: 0,
        degraded_reported: false,
    };
    state.sync_size();
    if options.autoplay {
        state.toggle_playback();
    }
    state.window.request_redraw();

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if state.handle_key(&event) {
                    elwt.exit();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                state.cursor = Some(position);
                state.drag_split();
            }
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => {
                state.dragging = button_state == ElementState::Pressed;
                state.drag_split();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                state.sync_size();
            }
            WindowEvent::RedrawRequested => state.redraw(),
            _ => {}
        },
        Event::AboutToWait => {
            if state.wants_redraw() {
                state.window.request_redraw();
            }
            match state.clip.next_deadline() {
                Some(deadline) if deadline <= Instant::now() => {
                    state.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                }
                Some(deadline) => elwt.set_control_flow(ControlFlow::WaitUntil(deadline)),
                None => elwt.set_control_flow(ControlFlow::Wait),
            }
        }
        Event::LoopExiting => {
            state.host.unmount();
        }
        _ => {}
    })?;
    Ok(())
}
