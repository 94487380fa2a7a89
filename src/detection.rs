//! Object detections produced by SSD-style networks.

pub mod nms;
pub mod ssd;

use nalgebra::Vector2;

use crate::rect::Rect;

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value
/// between 0.0 and 1.0, the object's clockwise rotation, and a possibly empty list of keypoints.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the angle of the detected object, in radians, clockwise.
    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    #[inline]
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn set_bounding_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn keypoints_mut(&mut self) -> &mut Vec<Keypoint> {
        &mut self.keypoints
    }

    /// Scales all coordinates by `scale`, then moves them by `offset`.
    ///
    /// Used to map a detection from a network's input into the frame it was sampled from.
    pub fn map_coords(&mut self, scale: f32, offset: Vector2<f32>) {
        let center = self.rect.center() * scale + offset;
        self.rect = Rect::from_center(
            center.x,
            center.y,
            self.rect.width() * scale,
            self.rect.height() * scale,
        );
        for kp in &mut self.keypoints {
            kp.x = kp.x * scale + offset.x;
            kp.y = kp.y * scale + offset.y;
        }
    }
}

/// A 2D keypoint of a [`Detection`].
///
/// The meaning of a keypoint depends on the detector and on its index in the keypoint list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn to_vector(&self) -> Vector2<f32> {
        Vector2::new(self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_coords() {
        let mut det = Detection::with_keypoints(
            0.9,
            Rect::from_center(10.0, 10.0, 4.0, 2.0),
            vec![Keypoint::new(1.0, 2.0)],
        );
        det.map_coords(2.0, Vector2::new(0.0, -5.0));

        let rect = det.bounding_rect();
        assert_eq!(rect.center(), Vector2::new(20.0, 15.0));
        assert_eq!((rect.width(), rect.height()), (8.0, 4.0));
        assert_eq!(det.keypoints(), [Keypoint::new(2.0, -1.0)]);
        assert_eq!(det.confidence(), 0.9);
    }
}
