//! Anchor generation for Single Shot MultiBox Detectors (SSDs).
//!
//! Only the anchor layout used by the palm detection network is supported: one center per feature
//! map cell, repeated for each box in that cell, with box sizes left to the network's output.

use std::ops::Index;

use crate::image::Resolution;

/// An anchor of an SSD network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    // values range from 0 to 1
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    /// Number of anchors per feature map cell. Non-zero.
    boxes_per_cell: u32,
    /// Feature map resolution of this layer.
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a layer description with `boxes_per_cell` anchors in each cell of a
    /// `width x height` feature map.
    pub fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert_ne!(boxes_per_cell, 0);
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

#[derive(Debug)]
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut anchors = Vec::new();

        for layer in layers {
            let width = layer.resolution.width();
            let height = layer.resolution.height();

            for y in 0..height {
                for x in 0..width {
                    let anchor = Anchor {
                        x_center: (x as f32 + 0.5) / width as f32,
                        y_center: (y as f32 + 0.5) / height as f32,
                    };
                    anchors.extend((0..layer.boxes_per_cell).map(|_| anchor));
                }
            }
        }

        Self { anchors }
    }

    /// Returns the total number of SSD anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let anchors = Anchors::calculate(&[LayerInfo::new(2, 2, 2), LayerInfo::new(3, 1, 1)]);
        assert_eq!(anchors.anchor_count(), 2 * 4 + 3);

        assert_eq!(anchors[0], anchors[1]);
        assert_eq!((anchors[0].x_center(), anchors[0].y_center()), (0.25, 0.25));
        assert_eq!((anchors[2].x_center(), anchors[2].y_center()), (0.75, 0.25));
        assert_eq!((anchors[7].x_center(), anchors[7].y_center()), (0.75, 0.75));
        assert_eq!((anchors[10].x_center(), anchors[10].y_center()), (0.5, 0.5));
    }
}
