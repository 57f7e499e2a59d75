use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::runtime::PlaybackEvent;

/// How much data a frame source can currently present, ordered from least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Whether a frame can be presented in this state.
    pub fn can_present(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// One decoded frame, shared between the producer and the renderer.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pixels: Arc<RgbaImage>,
    sequence: u64,
}

impl VideoFrame {
    pub fn new(pixels: Arc<RgbaImage>, sequence: u64) -> Self {
        Self { pixels, sequence }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self::new(Arc::new(image), 0)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Monotonic counter bumped by the producer whenever the content changes.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Whether both frames carry the same pixel buffer at the same sequence.
    pub fn same_content(&self, other: &VideoFrame) -> bool {
        self.sequence == other.sequence && Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// Producer of frames owned by the host (video element, decoder, still image).
///
/// The renderer only ever holds a weak reference to a source.
pub trait FrameSource {
    fn ready_state(&self) -> ReadyState;

    /// The frame to present right now, or `None` when nothing is decoded.
    fn current_frame(&self) -> Option<VideoFrame>;
}

/// A single still image that is always ready.
#[derive(Debug, Clone)]
pub struct StillFrameSource {
    frame: VideoFrame,
}

impl StillFrameSource {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            frame: VideoFrame::from_image(image),
        }
    }
}

impl FrameSource for StillFrameSource {
    fn ready_state(&self) -> ReadyState {
        if self.frame.is_empty() {
            ReadyState::HaveMetadata
        } else {
            ReadyState::HaveEnoughData
        }
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        Some(self.frame.clone())
    }
}

/// An in-memory clip of equally spaced frames with play/pause/seek controls.
///
/// Frames advance only when [`FrameSequence::advance`] is called with the
/// current time, so the owner controls the clock.
#[derive(Debug)]
pub struct FrameSequence {
    frames: Vec<Arc<RgbaImage>>,
    frame_duration: Duration,
    looping: bool,
    index: AtomicUsize,
    playing: AtomicBool,
    anchor: Mutex<Option<Instant>>,
}

impl FrameSequence {
    pub fn new(frames: Vec<RgbaImage>, frame_duration: Duration) -> Self {
        Self {
            frames: frames.into_iter().map(Arc::new).collect(),
            frame_duration: frame_duration.max(Duration::from_millis(1)),
            looping: false,
            index: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            anchor: Mutex::new(None),
        }
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn position(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn play(&self, now: Instant) -> PlaybackEvent {
        if self.index.load(Ordering::SeqCst) + 1 >= self.frames.len() && !self.looping {
            self.index.store(0, Ordering::SeqCst);
        }
        self.playing.store(true, Ordering::SeqCst);
        self.set_anchor(Some(now));
        PlaybackEvent::Play
    }

    pub fn pause(&self) -> PlaybackEvent {
        self.playing.store(false, Ordering::SeqCst);
        self.set_anchor(None);
        PlaybackEvent::Pause
    }

    /// Moves `delta` frames, clamped to the clip.
    pub fn seek_by(&self, delta: isize) -> PlaybackEvent {
        let last = self.frames.len().saturating_sub(1);
        let target = self.index.load(Ordering::SeqCst).saturating_add_signed(delta).min(last);
        self.index.store(target, Ordering::SeqCst);
        PlaybackEvent::Seeked
    }

    /// Advances the clip to `now`; returns `Ended` when the last frame is reached.
    pub fn advance(&self, now: Instant) -> Option<PlaybackEvent> {
        if !self.playing.load(Ordering::SeqCst) || self.frames.is_empty() {
            return None;
        }
        let anchor = self.anchor().unwrap_or(now);
        let elapsed = now.saturating_duration_since(anchor);
        let steps = (elapsed.as_nanos() / self.frame_duration.as_nanos()) as usize;
        if steps == 0 {
            return None;
        }
        self.set_anchor(Some(anchor + self.frame_duration * steps as u32));

        let next = self.index.load(Ordering::SeqCst) + steps;
        let len = self.frames.len();
        if next < len {
            self.index.store(next, Ordering::SeqCst);
            None
        } else if self.looping {
            self.index.store(next % len, Ordering::SeqCst);
            None
        } else {
            self.index.store(len - 1, Ordering::SeqCst);
            self.playing.store(false, Ordering::SeqCst);
            self.set_anchor(None);
            Some(PlaybackEvent::Ended)
        }
    }

    fn anchor(&self) -> Option<Instant> {
        *self.anchor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_anchor(&self, anchor: Option<Instant>) {
        *self.anchor.lock().unwrap_or_else(PoisonError::into_inner) = anchor;
    }

    /// When the next frame is due while playing.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.playing.load(Ordering::SeqCst) {
            return None;
        }
        self.anchor().map(|anchor| anchor + self.frame_duration)
    }
}

impl FrameSource for FrameSequence {
    fn ready_state(&self) -> ReadyState {
        if self.frames.is_empty() {
            ReadyState::HaveNothing
        } else if self.frames.len() == 1 || !self.playing.load(Ordering::SeqCst) {
            ReadyState::HaveCurrentData
        } else {
            ReadyState::HaveEnoughData
        }
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        let index = self.index.load(Ordering::SeqCst);
        self.frames
            .get(index)
            .map(|pixels| VideoFrame::new(Arc::clone(pixels), index as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(len: usize) -> FrameSequence {
        let frames = (0..len).map(|_| RgbaImage::new(2, 2)).collect();
        FrameSequence::new(frames, Duration::from_millis(40))
    }

    #[test]
    fn sequence_advances_with_time_and_reports_end() {
        let sequence = clip(3);
        let start = Instant::now();
        assert_eq!(sequence.play(start), PlaybackEvent::Play);
        assert_eq!(sequence.advance(start + Duration::from_millis(39)), None);
        assert_eq!(sequence.position(), 0);
        assert_eq!(sequence.advance(start + Duration::from_millis(41)), None);
        assert_eq!(sequence.position(), 1);
        assert_eq!(
            sequence.advance(start + Duration::from_millis(200)),
            Some(PlaybackEvent::Ended)
        );
        assert_eq!(sequence.position(), 2);
        assert!(!sequence.is_playing());
    }

    #[test]
    fn looping_sequence_wraps() {
        let sequence = clip(3).with_looping(true);
        let start = Instant::now();
        sequence.play(start);
        assert_eq!(sequence.advance(start + Duration::from_millis(160)), None);
        assert_eq!(sequence.position(), 1);
        assert_eq!(sequence.current_frame().map(|frame| frame.sequence()), Some(1));
    }

    #[test]
    fn seeking_is_clamped() {
        let sequence = clip(3);
        assert_eq!(sequence.seek_by(-4), PlaybackEvent::Seeked);
        assert_eq!(sequence.position(), 0);
        sequence.seek_by(10);
        assert_eq!(sequence.position(), 2);
    }

    #[test]
    fn ready_states_are_ordered() {
        assert!(!ReadyState::HaveNothing.can_present());
        assert!(!ReadyState::HaveMetadata.can_present());
        assert!(ReadyState::HaveCurrentData.can_present());
        assert!(ReadyState::HaveEnoughData.can_present());
    }

    #[test]
    fn empty_still_is_not_presentable() {
        let source = StillFrameSource::new(RgbaImage::new(0, 0));
        assert!(!source.ready_state().can_present());
        let source = StillFrameSource::new(RgbaImage::new(2, 2));
        assert_eq!(source.ready_state(), ReadyState::HaveEnoughData);
    }
}
