//! Planar geometry on small integer point sets.
//!
//! All functions here are pure and deterministic: computing a [`Measurement`] twice from the same
//! points always yields identical results.

use std::fmt;

use itertools::Itertools;
use nalgebra::Point2;

/// A point in pixel coordinates.
///
/// X points to the right, Y points down (image coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn to_na(self) -> Point2<f64> {
        Point2::new(f64::from(self.x), f64::from(self.y))
    }
}

impl From<(i32, i32)> for Point {
    #[inline]
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Returns the Euclidean distance between `a` and `b`.
pub fn distance(a: Point, b: Point) -> f64 {
    nalgebra::distance(&a.to_na(), &b.to_na())
}

/// Computes the length of the closed polyline through `points`, in the given order.
///
/// The last point is connected back to the first one. Fewer than 2 points have a perimeter of 0.
pub fn perimeter(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .iter()
        .circular_tuple_windows()
        .map(|(&a, &b)| distance(a, b))
        .sum()
}

/// Z component of `(a - o) x (b - o)`. Positive if `o -> a -> b` turns counter-clockwise.
fn cross(o: Point, a: Point, b: Point) -> i64 {
    let (ax, ay) = (i64::from(a.x) - i64::from(o.x), i64::from(a.y) - i64::from(o.y));
    let (bx, by) = (i64::from(b.x) - i64::from(o.x), i64::from(b.y) - i64::from(o.y));
    ax * by - ay * bx
}

/// Computes the convex hull of a point set.
///
/// Uses Andrew's monotone chain algorithm. The returned vertices are ordered counter-clockwise
/// (in a Y-up coordinate system) starting at the lowest-X point, without duplicates or collinear
/// points. Input order does not matter.
///
/// Degenerate inputs produce degenerate hulls: a single distinct point yields 1 vertex, and
/// collinear points yield the 2 extreme points.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_unstable_by_key(|p| (p.x, p.y));
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() * 2);

    // Lower hull.
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }

    // Upper hull.
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0
        {
            hull.pop();
        }
        hull.push(p);
    }

    // The last point is the starting point again.
    hull.pop();
    hull
}

/// Twice the signed area of a simple polygon, via the shoelace formula.
fn shoelace2(polygon: &[Point]) -> i64 {
    polygon
        .iter()
        .circular_tuple_windows()
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum()
}

/// Computes the area enclosed by the convex hull of `points`.
///
/// This is the area of the smallest convex region containing all points, which is not
/// necessarily the area of the polygon connecting `points` in order. The result is independent of
/// the order of `points`. Collinear inputs and inputs with fewer than 3 distinct points have an
/// area of 0.
pub fn polygon_area(points: &[Point]) -> f64 {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return 0.0;
    }

    shoelace2(&hull).unsigned_abs() as f64 / 2.0
}

/// An axis-aligned bounding box with inclusive integer bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    min: Point,
    max: Point,
}

impl BoundingBox {
    #[inline]
    pub fn min(&self) -> Point {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Point {
        self.max
    }

    /// Returns `max.x - min.x`.
    #[inline]
    pub fn width(&self) -> u32 {
        self.max.x.abs_diff(self.min.x)
    }

    /// Returns `max.y - min.y`.
    #[inline]
    pub fn height(&self) -> u32 {
        self.max.y.abs_diff(self.min.y)
    }
}

/// Computes the bounding box of `points`, or `None` if `points` is empty.
pub fn bounding_box(points: &[Point]) -> Option<BoundingBox> {
    let (first, rest) = points.split_first()?;
    let mut bb = BoundingBox {
        min: *first,
        max: *first,
    };
    for p in rest {
        bb.min.x = bb.min.x.min(p.x);
        bb.min.y = bb.min.y.min(p.y);
        bb.max.x = bb.max.x.max(p.x);
        bb.max.y = bb.max.y.max(p.y);
    }
    Some(bb)
}

/// Shape measurements derived from a point sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Area of the convex hull, in square pixels.
    pub area: f64,
    /// Length of the closed polyline through the points in their original order, in pixels.
    pub perimeter: f64,
    /// Bounding box width, in pixels.
    pub width: u32,
    /// Bounding box height, in pixels.
    pub height: u32,
}

impl Measurement {
    /// Measures `points`.
    ///
    /// Returns `None` if `points` is empty. Callers that need a meaningful polygon should check
    /// for at least 3 points first; 1 or 2 points are measured as a degenerate shape with zero
    /// area.
    pub fn of(points: &[Point]) -> Option<Self> {
        let bb = bounding_box(points)?;
        Some(Self {
            area: polygon_area(points),
            perimeter: perimeter(points),
            width: bb.width(),
            height: bb.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn pts(raw: &[(i32, i32)]) -> Vec<Point> {
        raw.iter().copied().map(Point::from).collect()
    }

    const SQUARE: &[(i32, i32)] = &[(0, 0), (10, 0), (10, 10), (0, 10)];

    #[test]
    fn distance_properties() {
        let a = Point::new(3, -7);
        let b = Point::new(-2, 5);
        assert_eq!(distance(a, a), 0.0);
        assert_eq!(distance(a, b), distance(b, a));
        assert_relative_eq!(distance(Point::new(0, 0), Point::new(3, 4)), 5.0);
        assert!(distance(a, b) > 0.0);
    }

    #[test]
    fn square_perimeter_and_area() {
        let square = pts(SQUARE);
        assert_relative_eq!(perimeter(&square), 40.0);
        assert_relative_eq!(polygon_area(&square), 100.0);
    }

    #[test]
    fn degenerate_perimeter() {
        assert_eq!(perimeter(&[]), 0.0);
        assert_eq!(perimeter(&pts(&[(4, 4)])), 0.0);
        // There and back again.
        assert_relative_eq!(perimeter(&pts(&[(0, 0), (3, 4)])), 10.0);
    }

    #[test]
    fn area_is_permutation_invariant() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for shape in [
            pts(SQUARE),
            // Not in convex position: (4, 3) lies inside the triangle of the others.
            pts(&[(0, 0), (4, 3), (10, 0), (5, 10)]),
        ] {
            let area = polygon_area(&shape);
            for _ in 0..20 {
                let mut shuffled = shape.clone();
                rng.shuffle(&mut shuffled);
                assert_eq!(polygon_area(&shuffled), area);
            }
        }
    }

    #[test]
    fn perimeter_depends_on_order() {
        let square = pts(SQUARE);
        let crossed = pts(&[(0, 0), (10, 10), (10, 0), (0, 10)]);
        assert_relative_eq!(perimeter(&crossed), 20.0 + 2.0 * 200f64.sqrt());
        assert!(perimeter(&crossed) != perimeter(&square));
        assert_eq!(polygon_area(&crossed), polygon_area(&square));

        let concave = pts(&[(0, 0), (4, 3), (10, 0), (5, 10)]);
        let reordered = pts(&[(0, 0), (10, 0), (4, 3), (5, 10)]);
        assert!(perimeter(&concave) != perimeter(&reordered));
        assert_eq!(polygon_area(&concave), polygon_area(&reordered));
    }

    #[test]
    fn non_convex_area_uses_hull() {
        // The hull is the triangle (0,0), (10,0), (5,10) with area 50.
        let concave = pts(&[(0, 0), (4, 3), (10, 0), (5, 10)]);
        assert_relative_eq!(polygon_area(&concave), 50.0);
        assert_eq!(convex_hull(&concave).len(), 3);
    }

    #[test]
    fn triangle_area_positive() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..100 {
            let a = Point::new(rng.i32(-500..500), rng.i32(-500..500));
            let b = Point::new(rng.i32(-500..500), rng.i32(-500..500));
            let c = Point::new(rng.i32(-500..500), rng.i32(-500..500));
            if cross(a, b, c) == 0 {
                continue;
            }
            let area = polygon_area(&[a, b, c]);
            assert!(area > 0.0);
            assert_relative_eq!(area, cross(a, b, c).unsigned_abs() as f64 / 2.0);
        }
    }

    #[test]
    fn collinear_area_zero() {
        assert_eq!(polygon_area(&pts(&[(0, 0), (1, 1), (2, 2), (7, 7)])), 0.0);
        assert_eq!(polygon_area(&pts(&[(0, 5), (3, 5), (-8, 5)])), 0.0);
        assert_eq!(polygon_area(&pts(&[(1, 1), (1, 1), (1, 1)])), 0.0);
        assert_eq!(polygon_area(&pts(&[(1, 1), (2, 2)])), 0.0);
        assert_eq!(polygon_area(&[]), 0.0);
    }

    #[test]
    fn hull_collapses_duplicates() {
        let hull = convex_hull(&pts(&[(0, 0), (10, 0), (0, 0), (0, 10), (10, 0)]));
        assert_eq!(hull.len(), 3);
        assert_relative_eq!(
            polygon_area(&pts(&[(0, 0), (10, 0), (0, 0), (0, 10)])),
            50.0
        );
    }

    #[test]
    fn hull_drops_collinear_edge_points() {
        let hull = convex_hull(&pts(&[(0, 0), (5, 0), (10, 0), (10, 10), (0, 10)]));
        assert_eq!(hull, pts(&[(0, 0), (10, 0), (10, 10), (0, 10)]));
    }

    #[test]
    fn bounding_box_extent() {
        assert_eq!(bounding_box(&[]), None);

        let bb = bounding_box(&pts(&[(3, 9), (-2, 4), (7, 1)])).unwrap();
        assert_eq!(bb.min(), Point::new(-2, 1));
        assert_eq!(bb.max(), Point::new(7, 9));
        assert_eq!(bb.width(), 9);
        assert_eq!(bb.height(), 8);
    }

    #[test]
    fn rectangle_measurement() {
        let m = Measurement::of(&pts(&[(0, 0), (20, 0), (20, 10), (0, 10)])).unwrap();
        assert_relative_eq!(m.area, 200.0);
        assert_relative_eq!(m.perimeter, 60.0);
        assert_eq!(m.width, 20);
        assert_eq!(m.height, 10);

        assert_eq!(Measurement::of(&[]), None);
    }

    #[test]
    fn measurement_is_deterministic() {
        let points = pts(&[(13, 97), (150, 22), (171, 130), (40, 160)]);
        assert_eq!(Measurement::of(&points), Measurement::of(&points));
    }

    #[test]
    fn point_display() {
        assert_eq!(Point::new(12, -3).to_string(), "(12, -3)");
    }
}
