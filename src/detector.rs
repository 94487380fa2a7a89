//! The seam between the frame pipeline and a hand landmark model.

use crate::hand::landmark::HandLandmarks;
use crate::image::Image;
use crate::timer::Timer;

/// Detection parameters shared by [`HandDetector`] implementations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
    max_hands: usize,
    min_detection: f32,
    min_presence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_hands: 1,
            min_detection: Self::DEFAULT_MIN_DETECTION,
            min_presence: Self::DEFAULT_MIN_PRESENCE,
        }
    }
}

impl DetectorOptions {
    pub const DEFAULT_MIN_DETECTION: f32 = 0.5;
    pub const DEFAULT_MIN_PRESENCE: f32 = 0.5;

    /// Sets the minimum confidence a hand detection needs before its landmarks are estimated.
    ///
    /// # Panics
    ///
    /// Panics if `min_detection` is not in `0.0..=1.0`.
    pub fn with_min_detection(self, min_detection: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&min_detection),
            "minimum detection confidence {min_detection} out of range"
        );
        Self {
            min_detection,
            ..self
        }
    }

    /// Sets the minimum presence confidence a hand needs to be reported, and to keep being
    /// tracked across frames.
    ///
    /// # Panics
    ///
    /// Panics if `min_presence` is not in `0.0..=1.0`.
    pub fn with_min_presence(self, min_presence: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&min_presence),
            "minimum presence {min_presence} out of range"
        );
        Self {
            min_presence,
            ..self
        }
    }

    /// Returns the maximum number of hands a detector reports per frame. Always 1.
    #[inline]
    pub fn max_hands(&self) -> usize {
        self.max_hands
    }

    #[inline]
    pub fn min_detection(&self) -> f32 {
        self.min_detection
    }

    #[inline]
    pub fn min_presence(&self) -> f32 {
        self.min_presence
    }
}

/// Trait for hand landmark detectors.
///
/// A detector looks at a whole RGB frame and returns the landmarks of every hand it is confident
/// about, at most [`DetectorOptions::max_hands`] of them. An empty list means no hand was found.
pub trait HandDetector {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<HandLandmarks>>;

    /// Returns profiling timers to include in FPS logs.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: HandDetector + ?Sized> HandDetector for &mut D {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
        (**self).detect(image)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

impl<D: HandDetector + ?Sized> HandDetector for Box<D> {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
        (**self).detect(image)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}
