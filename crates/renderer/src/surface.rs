use crossbeam_channel::{Receiver, Sender, TryRecvError};
use winit::dpi::PhysicalSize;

/// Asynchronous notifications about the drawable surface.
///
/// Producers (device-lost callbacks, resize observers, the host window) post
/// these into the renderer's queue; the renderer drains it at the start of
/// every frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Displayed size in logical pixels plus the current device pixel ratio.
    Resized {
        width: f64,
        height: f64,
        scale_factor: f64,
    },
    ContextLost {
        reason: String,
    },
    ContextRestored,
}

/// Cloneable handle used to post [`SurfaceEvent`]s from any thread.
#[derive(Debug, Clone)]
pub struct SurfaceEventSender {
    inner: Sender<SurfaceEvent>,
}

impl SurfaceEventSender {
    /// Posts an event; returns `false` when the renderer is gone.
    pub fn send(&self, event: SurfaceEvent) -> bool {
        self.inner.send(event).is_ok()
    }
}

pub(crate) struct SurfaceEventQueue {
    sender: Sender<SurfaceEvent>,
    receiver: Receiver<SurfaceEvent>,
}

impl SurfaceEventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> SurfaceEventSender {
        SurfaceEventSender {
            inner: self.sender.clone(),
        }
    }

    pub fn drain(&self) -> Vec<SurfaceEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}

/// Converts displayed sizes into backing store sizes and filters out no-op changes.
#[derive(Debug, Clone)]
pub struct SurfaceSizer {
    max_pixel_ratio: f64,
    current: PhysicalSize<u32>,
}

impl SurfaceSizer {
    pub fn new(max_pixel_ratio: f64, initial: PhysicalSize<u32>) -> Self {
        let max_pixel_ratio = if max_pixel_ratio.is_finite() && max_pixel_ratio > 0.0 {
            max_pixel_ratio
        } else {
            crate::types::DEFAULT_MAX_PIXEL_RATIO
        };
        Self {
            max_pixel_ratio,
            current: initial,
        }
    }

    pub fn max_pixel_ratio(&self) -> f64 {
        self.max_pixel_ratio
    }

    /// Backing store size for a logical size at `scale_factor`, with the ratio capped.
    pub fn physical_size(&self, width: f64, height: f64, scale_factor: f64) -> PhysicalSize<u32> {
        let ratio = if scale_factor.is_finite() && scale_factor > 0.0 {
            scale_factor.min(self.max_pixel_ratio)
        } else {
            1.0
        };
        PhysicalSize::new(to_pixels(width * ratio), to_pixels(height * ratio))
    }

    /// Records an observed size; returns the new backing size only when it differs.
    pub fn observe(
        &mut self,
        width: f64,
        height: f64,
        scale_factor: f64,
    ) -> Option<PhysicalSize<u32>> {
        let next = self.physical_size(width, height, scale_factor);
        if next == self.current {
            None
        } else {
            self.current = next;
            Some(next)
        }
    }
}

fn to_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_ratio_is_capped() {
        let sizer = SurfaceSizer::new(2.0, PhysicalSize::new(0, 0));
        assert_eq!(sizer.physical_size(100.0, 50.0, 3.0), PhysicalSize::new(200, 100));
        assert_eq!(sizer.physical_size(100.0, 50.0, 1.5), PhysicalSize::new(150, 75));
    }

    #[test]
    fn repeated_sizes_report_once() {
        let mut sizer = SurfaceSizer::new(2.0, PhysicalSize::new(0, 0));
        assert_eq!(sizer.observe(320.0, 240.0, 1.0), Some(PhysicalSize::new(320, 240)));
        assert_eq!(sizer.observe(320.0, 240.0, 1.0), None);
        assert_eq!(sizer.observe(320.2, 240.1, 1.0), None);
        assert_eq!(sizer.observe(160.0, 120.0, 2.0), None);
        assert_eq!(sizer.observe(160.0, 120.0, 1.0), Some(PhysicalSize::new(160, 120)));
    }

    #[test]
    fn invalid_ratio_falls_back() {
        let sizer = SurfaceSizer::new(f64::NAN, PhysicalSize::new(1, 1));
        assert_eq!(sizer.max_pixel_ratio(), 2.0);
        assert_eq!(sizer.physical_size(10.0, 10.0, -1.0), PhysicalSize::new(10, 10));
    }

    #[test]
    fn queue_drains_in_order() {
        let queue = SurfaceEventQueue::new();
        let sender = queue.sender();
        assert!(sender.send(SurfaceEvent::ContextLost {
            reason: "test".into()
        }));
        assert!(sender.send(SurfaceEvent::ContextRestored));
        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], SurfaceEvent::ContextRestored);
        assert!(queue.drain().is_empty());
    }
}
