//! Per-frame processing: detect, extract, measure and annotate.

use crate::{
    detector::HandDetector,
    geometry::{Measurement, Point},
    image::{draw, Color, Image},
    shape,
    timer::Timer,
};

/// Left edge of the measurement overlay.
const OVERLAY_X: i32 = 30;
/// Baselines of the four measurement lines.
const OVERLAY_LINES_Y: [i32; 4] = [50, 80, 110, 140];

/// A frame that went through the [`FramePipeline`].
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// The frame with the hand skeleton, fingertip shape and measurements drawn onto it.
    pub image: Image,
    /// Fingertip points in [`shape::extract_fingertips`] order, or empty if no hand was detected.
    pub points: Vec<Point>,
}

/// Runs the hand detector on frames and annotates them with the measured fingertip shape.
pub struct FramePipeline<D> {
    detector: D,
    t_detect: Timer,
    t_annotate: Timer,
}

impl<D: HandDetector> FramePipeline<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            t_detect: Timer::new("detect"),
            t_annotate: Timer::new("annotate"),
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Processes a single frame.
    ///
    /// Detector failures are logged and treated as if no hand was in the frame.
    pub fn process(&mut self, mut image: Image) -> ProcessedFrame {
        let hands = self.t_detect.time(|| match self.detector.detect(&image) {
            Ok(hands) => hands,
            Err(e) => {
                log::warn!("hand detection failed: {e:#}");
                Vec::new()
            }
        });

        let points = shape::extract_fingertips(&hands, image.resolution());

        let _guard = self.t_annotate.start();
        shape::annotate(&mut image, &hands, &points);
        if points.len() >= 3 {
            if let Some(m) = Measurement::of(&points) {
                draw_measurement(&mut image, &m);
            }
        }

        ProcessedFrame { image, points }
    }

    /// Returns profiling timers for detection and annotation, followed by the detector's own.
    pub fn timers(&self) -> Vec<&Timer> {
        let mut timers = vec![&self.t_detect, &self.t_annotate];
        timers.extend(self.detector.timers());
        timers
    }
}

fn draw_measurement(image: &mut Image, m: &Measurement) {
    let lines = [
        format!("Area: {:.2} sq.px", m.area),
        format!("Perimeter: {:.2} px", m.perimeter),
        format!("Width: {} px", m.width),
        format!("Height: {} px", m.height),
    ];
    for (line, y) in lines.iter().zip(OVERLAY_LINES_Y) {
        draw::text(image, OVERLAY_X, y, line)
            .align_left()
            .align_bottom()
            .color(Color::GREEN);
    }

    let right = image.width() as i32 - OVERLAY_X;
    draw::text(image, right, OVERLAY_LINES_Y[0], "Saving frames to output folder")
        .align_right()
        .align_bottom()
        .color(Color::RED);
}

#[cfg(test)]
mod tests {
    use crate::hand::landmark::{HandLandmarks, Landmark, LandmarkIdx, NUM_LANDMARKS};

    use super::*;

    struct Fixed(Vec<HandLandmarks>);

    impl HandDetector for Fixed {
        fn detect(&mut self, _: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl HandDetector for Broken {
        fn detect(&mut self, _: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
            anyhow::bail!("inference failed")
        }
    }

    fn rectangle_hand() -> HandLandmarks {
        let mut positions = [Landmark::new(0.5, 0.5); NUM_LANDMARKS];
        positions[LandmarkIdx::IndexFingerTip as usize] = Landmark::new(0.25, 0.25);
        positions[LandmarkIdx::MiddleFingerTip as usize] = Landmark::new(0.75, 0.25);
        positions[LandmarkIdx::RingFingerTip as usize] = Landmark::new(0.75, 0.5);
        positions[LandmarkIdx::PinkyTip as usize] = Landmark::new(0.25, 0.5);
        HandLandmarks::new(positions)
    }

    fn text_pixels(image: &Image) -> usize {
        (30..85)
            .flat_map(|y| (0..85).map(move |x| (x, y)))
            .filter(|&(x, y)| image.get(x, y) != Color::NULL)
            .count()
    }

    #[test]
    fn measures_detected_hand() {
        let mut pipeline = FramePipeline::new(Fixed(vec![rectangle_hand()]));
        let frame = pipeline.process(Image::new(400, 400));

        assert_eq!(
            frame.points,
            [
                Point::new(100, 100),
                Point::new(300, 100),
                Point::new(300, 200),
                Point::new(100, 200),
            ]
        );
        let m = Measurement::of(&frame.points).unwrap();
        assert_eq!(m.area, 20000.0);
        assert_eq!(m.perimeter, 600.0);
        // Overlay text rows are left of the hand.
        assert!(text_pixels(&frame.image) > 0);
    }

    #[test]
    fn no_hand_no_overlay() {
        let mut pipeline = FramePipeline::new(Fixed(Vec::new()));
        let frame = pipeline.process(Image::new(400, 400));
        assert!(frame.points.is_empty());
        assert!(frame.image.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn detector_error_is_no_hand() {
        let mut pipeline = FramePipeline::new(Broken);
        let frame = pipeline.process(Image::new(64, 48));
        assert!(frame.points.is_empty());
        assert_eq!(frame.image.resolution(), crate::image::Resolution::new(64, 48));
    }
}
