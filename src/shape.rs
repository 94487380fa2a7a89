//! The fingertip shape: four pixel points spanned by the index, middle, ring and pinky tips.

use crate::{
    geometry::Point,
    hand::landmark::{HandLandmarks, FINGERTIPS},
    image::{draw, Color, Image, Resolution},
};

const FINGERTIP_DIAMETER: u32 = 20;

/// Converts the fingertips of the first detected hand to pixel coordinates.
///
/// Returns an empty sequence when `hands` is empty, and exactly one point per entry of
/// [`FINGERTIPS`], in that order, otherwise. Any further hands are ignored.
pub fn extract_fingertips(hands: &[HandLandmarks], res: Resolution) -> Vec<Point> {
    let Some(hand) = hands.first() else {
        return Vec::new();
    };

    FINGERTIPS
        .iter()
        .map(|tip| hand.get(tip.landmark()).to_pixel(res))
        .collect()
}

/// Draws the hand skeletons and highlights the fingertip shape.
///
/// `points` is the sequence returned by [`extract_fingertips`] for the same hands.
pub fn annotate(image: &mut Image, hands: &[HandLandmarks], points: &[Point]) {
    for hand in hands {
        hand.draw(image);
    }

    for &point in points {
        draw::circle(image, point, FINGERTIP_DIAMETER)
            .color(Color::YELLOW)
            .filled();
    }
    draw::polygon(image, points)
        .color(Color::GREEN)
        .stroke_width(2);
}
