use std::time::Instant;

/// Snapshot of the clock fed to the `time` uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let elapsed = self.origin.elapsed();
        let sample = TimeSample::new(elapsed.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time }
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {}

    fn sample(&mut self) -> TimeSample {
        TimeSample::new(self.time, 0)
    }
}

/// Deterministic clock that advances by a constant step per sample.
#[derive(Debug, Clone, Copy)]
pub struct SteppedTimeSource {
    start: f32,
    step: f32,
    frame: u64,
}

impl SteppedTimeSource {
    pub fn new(start: f32, step: f32) -> Self {
        Self {
            start,
            step,
            frame: 0,
        }
    }
}

impl TimeSource for SteppedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.start + self.step * self.frame as f32, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource>;

/// Playback notifications forwarded from the frame source's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Play,
    Pause,
    Ended,
    /// The current frame changed while paused (scrubbing, stepping).
    Seeked,
}

/// Redraw policy state.
///
/// `Playing` redraws every tick to keep up with new frames; `Idle` only
/// redraws when staged state changed since the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

impl PlaybackState {
    pub fn on_event(self, event: PlaybackEvent) -> Self {
        match (self, event) {
            (_, PlaybackEvent::Play) => PlaybackState::Playing,
            (_, PlaybackEvent::Pause | PlaybackEvent::Ended) => PlaybackState::Idle,
            (state, PlaybackEvent::Seeked) => state,
        }
    }

    /// Whether a tick in this state must draw regardless of the dirty flag.
    pub fn redraws_continuously(self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// Whether the host-driven draw cycle is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Stopped,
    Running,
}

/// Result of a single host callback tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was drawn.
    Rendered,
    /// Nothing changed while idle, or the source had no frame to present.
    Skipped,
    /// The loop is stopped, the context is lost, or the renderer is disposed.
    Suspended,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_and_pause_toggle_redraw_policy() {
        let state = PlaybackState::default();
        assert!(!state.redraws_continuously());
        let playing = state.on_event(PlaybackEvent::Play);
        assert_eq!(playing, PlaybackState::Playing);
        assert!(playing.redraws_continuously());
        assert_eq!(playing.on_event(PlaybackEvent::Seeked), PlaybackState::Playing);
        assert_eq!(playing.on_event(PlaybackEvent::Ended), PlaybackState::Idle);
        assert_eq!(playing.on_event(PlaybackEvent::Pause), PlaybackState::Idle);
    }

    #[test]
    fn stepped_time_source_advances_per_sample() {
        let mut source = SteppedTimeSource::new(1.0, 0.5);
        assert_eq!(source.sample().seconds, 1.0);
        assert_eq!(source.sample().seconds, 1.5);
        source.reset();
        let sample = source.sample();
        assert_eq!(sample.seconds, 1.0);
        assert_eq!(sample.frame_index, 0);
    }
}
