//! Floating-point rectangles used to locate hands in a frame.
//!
//! Coordinates are in pixels with Y pointing down. Rotations are given in radians, clockwise as
//! seen on screen.

use std::fmt;

use nalgebra::{Rotation2, Vector2};

/// An axis-aligned rectangle, stored as center and size.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Vector2<f32>,
    size: Vector2<f32>,
}

impl Rect {
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vector2::new(x_center, y_center),
            size: Vector2::new(width, height),
        }
    }

    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    /// Scales width and height by `scale`, keeping the center in place.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        Self {
            center: self.center,
            size: self.size * scale,
        }
    }

    /// Grows this rectangle by adding a margin relative to width and height.
    ///
    /// `amount` is the relative amount of the rectangle's width and height to add to *each* side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        Self {
            center: self.center,
            size: self.size * (1.0 + 2.0 * amount),
        }
    }

    /// Symmetrically extends one dimension of `self` so that `width / height == aspect`.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: f32) -> Self {
        let mut res = *self;
        let target_width = self.height() * aspect;
        if target_width >= self.width() {
            res.size.x = target_width;
        } else {
            res.size.y = self.width() / aspect;
        }
        res
    }

    #[inline]
    pub fn top_left(&self) -> Vector2<f32> {
        self.center - self.size * 0.5
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.top_left().x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.top_left().y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn center(&self) -> Vector2<f32> {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns [`None`] when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min = self.top_left().sup(&other.top_left());
        let max = (self.top_left() + self.size).inf(&(other.top_left() + other.size));
        if min.x > max.x || min.y > max.y {
            return None;
        }

        Some(Rect::from_top_left(min.x, min.y, max.x - min.x, max.y - min.y))
    }

    /// Computes the Intersection over Union (IoU) of `self` and `other`.
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |rect| rect.area());
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({:.1},{:.1})/{:.1}x{:.1}",
            self.x(),
            self.y(),
            self.width(),
            self.height()
        )
    }
}

/// A [`Rect`] rotated clockwise around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Approximates the rotated bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<I: IntoIterator<Item = Vector2<f32>>>(radians: f32, points: I) -> Option<Self> {
        let cw = clockwise(radians);
        let mut points = points.into_iter().map(|p| cw * p).peekable();
        let first = *points.peek()?;

        let (min, max) = points.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        let center = clockwise(-radians) * ((min + max) * 0.5);
        let size = max - min;

        Some(Self::new(
            Rect::from_center(center.x, center.y, size.x, size.y),
            radians,
        ))
    }

    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Applies a closure to the underlying non-rotated [`Rect`].
    #[must_use]
    pub fn map(mut self, f: impl FnOnce(Rect) -> Rect) -> Self {
        self.rect = f(self.rect);
        self
    }

    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.map(|rect| rect.grow_rel(amount))
    }

    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: f32) -> Self {
        self.map(|rect| rect.grow_to_fit_aspect(aspect))
    }

    /// Transforms a point from the parent coordinate system into the rectangle's system, whose
    /// origin is the rectangle's top left corner.
    pub fn transform_in(&self, pt: Vector2<f32>) -> Vector2<f32> {
        let half = self.rect.size * 0.5;
        clockwise(self.radians) * (pt - self.rect.center) + half
    }

    /// Transforms a point from the rectangle's coordinate system to the parent system.
    pub fn transform_out(&self, pt: Vector2<f32>) -> Vector2<f32> {
        let half = self.rect.size * 0.5;
        clockwise(-self.radians) * (pt - half) + self.rect.center
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

/// Returns the rotation that turns vectors clockwise on screen (Y pointing down).
fn clockwise(radians: f32) -> Rotation2<f32> {
    Rotation2::new(-radians)
}

/// Computes the clockwise rotation that makes the direction from `tip` to `base` point straight
/// down, ie. that turns an object whose `tip` lies above its `base` upright.
pub fn upright_rotation(tip: Vector2<f32>, base: Vector2<f32>) -> f32 {
    let rel = base - tip;
    if rel == Vector2::zeros() {
        return 0.0;
    }
    Rotation2::rotation_between(&Vector2::y(), &rel).angle()
}
