//! Frame sources.

pub mod webcam;

use crate::{image::Image, timer::Timer};

/// A source of video frames that holds on to a device until it is released.
pub trait Camera {
    /// Reads the next frame, blocking until one is available.
    fn read(&mut self) -> anyhow::Result<Image>;

    /// Releases the underlying device.
    ///
    /// Reading from a released camera returns an error. Releasing twice has no effect.
    fn release(&mut self);

    /// Returns profiling timers to include in FPS logs.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn read(&mut self) -> anyhow::Result<Image> {
        (**self).read()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}
