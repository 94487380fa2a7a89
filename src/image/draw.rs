//! Drawing primitives for annotating frames.
//!
//! Every function returns a guard that draws the shape when dropped, so the shape can be
//! customized with chained setters first:
//!
//! ```no_run
//! # use handshape::{geometry::Point, image::{draw, Color, Image}};
//! # let mut image = Image::new(64, 64);
//! draw::line(&mut image, Point::new(0, 0), Point::new(63, 63))
//!     .color(Color::GREEN)
//!     .stroke_width(2);
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{self, Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use itertools::Itertools;

use crate::geometry;
use crate::image::{Color, Image};

/// Guard returned by [`marker`]; draws the marker when dropped and allows customization.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    color: Color,
    size: u32,
}

impl<'a> DrawMarker<'a> {
    /// Sets the marker's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the width and height of the marker.
    ///
    /// The default size is 5. The size must be *uneven* and *non-zero*. A size of 1 will result in
    /// a single pixel getting drawn.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size != 0, "marker size must be greater than zero");
        assert!(size % 2 == 1, "marker size must be an uneven number");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let offset = ((self.size - 1) / 2) as i32;
        for (xoff, yoff) in (-offset..=offset)
            .zip(-offset..=offset)
            .chain((-offset..=offset).rev().zip(-offset..=offset))
        {
            match embedded_graphics::Pixel(
                Point {
                    x: self.x + xoff,
                    y: self.y + yoff,
                },
                self.color,
            )
            .draw(&mut Target(&mut *self.image))
            {
                Ok(_) => {}
                Err(infallible) => match infallible {},
            }
        }
    }
}

/// Guard returned by [`line`][line()]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start: geometry::Point,
    end: geometry::Point,
    color: Color,
    stroke_width: u32,
}

impl<'a> DrawLine<'a> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl<'a> Drop for DrawLine<'a> {
    fn drop(&mut self) {
        match Line::new(
            Point::new(self.start.x, self.start.y),
            Point::new(self.end.x, self.end.y),
        )
        .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
        .draw(&mut Target(&mut *self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`polygon`]; draws the closed polygon outline when dropped.
pub struct DrawPolygon<'a> {
    image: &'a mut Image,
    points: &'a [geometry::Point],
    color: Color,
    stroke_width: u32,
}

impl<'a> DrawPolygon<'a> {
    /// Sets the outline color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the outline's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl<'a> Drop for DrawPolygon<'a> {
    fn drop(&mut self) {
        if self.points.len() < 2 {
            return;
        }

        for (&start, &end) in self.points.iter().circular_tuple_windows() {
            line(&mut *self.image, start, end)
                .color(self.color)
                .stroke_width(self.stroke_width);
        }
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
    alignment: Alignment,
    baseline: Baseline,
}

impl<'a> DrawText<'a> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Aligns the top of the text with the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Aligns the bottom of the text with the `y` coordinate.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }

    /// Aligns the right side of the text with the `x` coordinate.
    pub fn align_right(&mut self) -> &mut Self {
        self.alignment = Alignment::Right;
        self
    }
}

impl<'a> Drop for DrawText<'a> {
    fn drop(&mut self) {
        // FIXME: e-g's fonts lack some common glyphs (eg. `°`)
        let character_style = MonoTextStyle::new(&FONT_10X20, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        match Text::with_text_style(
            self.text,
            Point::new(self.x, self.y),
            character_style,
            text_style,
        )
        .draw(&mut Target(&mut *self.image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Guard returned by [`circle`]; draws the circle when dropped and allows customization.
pub struct DrawCircle<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    diameter: u32,
    stroke_width: u32,
    filled: bool,
    color: Color,
}

impl<'a> DrawCircle<'a> {
    /// Sets the circle's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the circle's stroke width.
    ///
    /// By default, a stroke width of 1 is used. Has no effect on filled circles.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }

    /// Fills the circle instead of only drawing its outline.
    pub fn filled(&mut self) -> &mut Self {
        self.filled = true;
        self
    }
}

impl<'a> Drop for DrawCircle<'a> {
    fn drop(&mut self) {
        let top_left = Point {
            x: self.x - (self.diameter / 2) as i32,
            y: self.y - (self.diameter / 2) as i32,
        };
        let circle = primitives::Circle {
            top_left,
            diameter: self.diameter,
        };
        let style = if self.filled {
            PrimitiveStyle::with_fill(self.color)
        } else {
            PrimitiveStyle::with_stroke(self.color, self.stroke_width)
        };
        match circle.into_styled(style).draw(&mut Target(&mut *self.image)) {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a marker onto an image.
///
/// This can be used to visualize shape landmarks or points of interest.
pub fn marker(image: &mut Image, pos: geometry::Point) -> DrawMarker<'_> {
    DrawMarker {
        image,
        x: pos.x,
        y: pos.y,
        color: Color::from_rgb8(255, 0, 0),
        size: 5,
    }
}

/// Draws a line onto an image.
pub fn line(image: &mut Image, start: geometry::Point, end: geometry::Point) -> DrawLine<'_> {
    DrawLine {
        image,
        start,
        end,
        color: Color::from_rgb8(0, 0, 255),
        stroke_width: 1,
    }
}

/// Draws the closed outline through `points`, connecting the last point back to the first.
///
/// Nothing is drawn for fewer than 2 points.
pub fn polygon<'a>(image: &'a mut Image, points: &'a [geometry::Point]) -> DrawPolygon<'a> {
    DrawPolygon {
        image,
        points,
        color: Color::GREEN,
        stroke_width: 1,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is drawn centered horizontally and vertically around `x` and `y`.
pub fn text<'a>(image: &'a mut Image, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        x,
        y,
        text,
        color: Color::from_rgb8(255, 0, 0),
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

/// Draws a circle onto an image.
pub fn circle(image: &mut Image, center: geometry::Point, diameter: u32) -> DrawCircle<'_> {
    DrawCircle {
        image,
        x: center.x,
        y: center.y,
        diameter,
        stroke_width: 1,
        filled: false,
        color: Color::GREEN,
    }
}

struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        let (width, height) = (self.0.width(), self.0.height());

        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size { width, height },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            if pixel.0.x >= 0
                && (pixel.0.x as u32) < self.0.width()
                && pixel.0.y >= 0
                && (pixel.0.y as u32) < self.0.height()
            {
                self.0.set(pixel.0.x as _, pixel.0.y as _, pixel.1);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(image: &Image, color: Color) -> usize {
        let mut n = 0;
        for y in 0..image.height() {
            for x in 0..image.width() {
                if image.get(x, y) == color {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn marker_is_an_x() {
        let mut image = Image::new(9, 9);
        marker(&mut image, geometry::Point::new(4, 4)).color(Color::WHITE);
        // Two diagonals of 5 pixels sharing the center.
        assert_eq!(count(&image, Color::WHITE), 9);
        assert_eq!(image.get(4, 4), Color::WHITE);
        assert_eq!(image.get(2, 6), Color::WHITE);
    }

    #[test]
    fn clipped_to_image() {
        let mut image = Image::new(4, 4);
        line(
            &mut image,
            geometry::Point::new(-10, 1),
            geometry::Point::new(10, 1),
        )
        .color(Color::WHITE);
        circle(&mut image, geometry::Point::new(100, 100), 20).filled();
        text(&mut image, -50, -50, "off screen");
        assert_eq!(count(&image, Color::WHITE), 4);
    }

    #[test]
    fn filled_circle_covers_center() {
        let mut image = Image::new(21, 21);
        circle(&mut image, geometry::Point::new(10, 10), 11)
            .color(Color::YELLOW)
            .filled();
        assert_eq!(image.get(10, 10), Color::YELLOW);
        assert_eq!(image.get(0, 0), Color::NULL);

        let mut outline = Image::new(21, 21);
        circle(&mut outline, geometry::Point::new(10, 10), 11).color(Color::YELLOW);
        assert_eq!(outline.get(10, 10), Color::NULL);
    }

    #[test]
    fn polygon_is_closed() {
        let mut image = Image::new(12, 12);
        let square = [
            geometry::Point::new(1, 1),
            geometry::Point::new(10, 1),
            geometry::Point::new(10, 10),
            geometry::Point::new(1, 10),
        ];
        polygon(&mut image, &square).color(Color::WHITE);
        // The closing edge from (1, 10) back to (1, 1).
        assert_eq!(image.get(1, 5), Color::WHITE);
        assert_eq!(image.get(5, 5), Color::NULL);

        let mut untouched = Image::new(12, 12);
        polygon(&mut untouched, &square[..1]).color(Color::WHITE);
        assert_eq!(count(&untouched, Color::WHITE), 0);
    }
}
