//! Non-Maximum Averaging.
//!
//! SSD networks produce many overlapping detections for a single object. Non-maximum suppression
//! reduces those to one detection per object. The variant implemented here replaces each group
//! of overlapping detections with their confidence-weighted average, which jitters less between
//! frames than keeping only the most confident one.

use crate::rect::Rect;

use super::{Detection, Keypoint};

/// Merges overlapping detections.
#[derive(Debug)]
pub struct NonMaxSuppression {
    iou_thresh: f32,
    group: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            group: Vec::new(),
        }
    }

    /// Sets the intersection-over-union threshold to consider two detections as overlapping.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    /// Merges `detections`, returning one detection per group of overlapping ones.
    ///
    /// The result is ordered by descending confidence. Each merged detection keeps the confidence
    /// of the most confident member of its group.
    pub fn process(&mut self, mut detections: Vec<Detection>) -> Vec<Detection> {
        let mut out = Vec::new();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by(|a, b| a.confidence().total_cmp(&b.confidence()));

        while let Some(seed) = detections.pop() {
            self.group.clear();
            let seed_rect = seed.bounding_rect();
            let iou_thresh = self.iou_thresh;
            let mut i = 0;
            while i < detections.len() {
                if seed_rect.iou(&detections[i].bounding_rect()) >= iou_thresh {
                    self.group.push(detections.remove(i));
                } else {
                    i += 1;
                }
            }
            self.group.push(seed);

            out.push(average(&self.group));
        }

        self.group.clear();
        out
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the confidence-weighted average of `group`. The last element is the seed.
fn average(group: &[Detection]) -> Detection {
    let seed = &group[group.len() - 1];
    let num_keypoints = seed.keypoints().len();

    let mut center = nalgebra::Vector2::zeros();
    let mut size = nalgebra::Vector2::zeros();
    let mut angle = 0.0;
    let mut keypoints = vec![(0.0, 0.0); num_keypoints];
    let mut divisor = 0.0;
    for det in group {
        assert_eq!(
            det.keypoints().len(),
            num_keypoints,
            "keypoint count must be constant"
        );

        let factor = det.confidence();
        divisor += factor;
        center += det.bounding_rect().center() * factor;
        size += det.bounding_rect().size() * factor;
        angle += det.angle() * factor;
        for (acc, kp) in keypoints.iter_mut().zip(det.keypoints()) {
            acc.0 += kp.x() * factor;
            acc.1 += kp.y() * factor;
        }
    }

    if divisor <= 0.0 {
        return seed.clone();
    }

    center /= divisor;
    size /= divisor;
    let mut merged = Detection::with_keypoints(
        seed.confidence(),
        Rect::from_center(center.x, center.y, size.x, size.y),
        keypoints
            .into_iter()
            .map(|(x, y)| Keypoint::new(x / divisor, y / divisor))
            .collect(),
    );
    merged.set_angle(angle / divisor);
    merged
}
