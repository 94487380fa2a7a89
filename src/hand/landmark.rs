//! Hand landmark types.

use crate::geometry::Point;
use crate::image::{draw, Color, Image, Resolution};

/// Number of landmarks reported for each hand.
pub const NUM_LANDMARKS: usize = 21;

/// A landmark position in normalized image coordinates.
///
/// `(0, 0)` is the top left corner of the image and `(1, 1)` the bottom right one. Estimated
/// landmarks can lie slightly outside of that range when part of the hand is out of view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Converts the normalized position to pixel coordinates in an image of size `res`.
    ///
    /// Coordinates are rounded to the nearest pixel and clamped to `[0, width) x [0, height)`.
    pub fn to_pixel(&self, res: Resolution) -> Point {
        fn axis(v: f32, len: u32) -> i32 {
            let max = len.saturating_sub(1) as f32;
            (v * len as f32).round().clamp(0.0, max) as i32
        }

        Point::new(axis(self.x, res.width()), axis(self.y, res.height()))
    }
}

/// The landmarks of a single detected hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    positions: [Landmark; NUM_LANDMARKS],
    presence: f32,
    handedness: Handedness,
}

impl HandLandmarks {
    /// Creates a landmark set from positions ordered according to [`LandmarkIdx`].
    ///
    /// Presence starts out at 1.0.
    pub fn new(positions: [Landmark; NUM_LANDMARKS]) -> Self {
        Self {
            positions,
            presence: 1.0,
            handedness: Handedness::Right,
        }
    }

    pub fn with_presence(self, presence: f32) -> Self {
        Self { presence, ..self }
    }

    pub fn with_handedness(self, handedness: Handedness) -> Self {
        Self { handedness, ..self }
    }

    /// Returns a landmark's normalized position.
    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> Landmark {
        self.positions[idx as usize]
    }

    #[inline]
    pub fn positions(&self) -> &[Landmark; NUM_LANDMARKS] {
        &self.positions
    }

    /// Returns the presence flag, indicating the confidence of whether a hand was in the input
    /// image.
    ///
    /// The value is between 0.0 and 1.0, with higher values indicating higher confidence that a
    /// hand was present.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the estimated handedness of the hand in the image.
    #[inline]
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Draws the hand skeleton onto `image`.
    ///
    /// `image` is expected to be the image the landmarks were estimated on.
    pub fn draw(&self, image: &mut Image) {
        let res = image.resolution();
        for (a, b) in CONNECTIVITY {
            let a = self.get(*a).to_pixel(res);
            let b = self.get(*b).to_pixel(res);
            draw::line(image, a, b).color(Color::GREEN).stroke_width(2);
        }
        for lm in &self.positions {
            draw::marker(image, lm.to_pixel(res));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// The four fingertips spanning the measured shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fingertip {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Fingertip {
    /// Returns the landmark placed on this fingertip.
    pub const fn landmark(self) -> LandmarkIdx {
        match self {
            Self::Index => LandmarkIdx::IndexFingerTip,
            Self::Middle => LandmarkIdx::MiddleFingerTip,
            Self::Ring => LandmarkIdx::RingFingerTip,
            Self::Pinky => LandmarkIdx::PinkyTip,
        }
    }
}

/// Fingertips in the order they form the shape's polygon.
pub const FINGERTIPS: [Fingertip; 4] = [
    Fingertip::Index,
    Fingertip::Middle,
    Fingertip::Ring,
    Fingertip::Pinky,
];

const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingertip_indices() {
        let indices = FINGERTIPS.map(|tip| tip.landmark() as usize);
        assert_eq!(indices, [8, 12, 16, 20]);
        assert_eq!(LandmarkIdx::PinkyTip as usize, NUM_LANDMARKS - 1);
    }

    #[test]
    fn to_pixel_rounds() {
        let res = Resolution::new(640, 480);
        assert_eq!(Landmark::new(0.5, 0.5).to_pixel(res), Point::new(320, 240));
        // 0.1234 * 640 = 78.976, 0.9876 * 480 = 474.048
        assert_eq!(Landmark::new(0.1234, 0.9876).to_pixel(res), Point::new(79, 474));
    }

    #[test]
    fn to_pixel_clamps() {
        let res = Resolution::new(640, 480);
        assert_eq!(Landmark::new(1.0, 1.0).to_pixel(res), Point::new(639, 479));
        assert_eq!(Landmark::new(-0.2, 1.3).to_pixel(res), Point::new(0, 479));
        assert_eq!(Landmark::new(f32::NAN, 0.0).to_pixel(res), Point::new(0, 0));
    }

    #[test]
    fn draw_marks_landmarks() {
        let mut image = Image::new(100, 100);
        let hand = HandLandmarks::new([Landmark::new(0.5, 0.5); NUM_LANDMARKS]);
        hand.draw(&mut image);
        assert_ne!(image.get(50, 50), Color::NULL);
        assert_eq!(image.get(0, 0), Color::NULL);
    }
}
