//! Palm detection.
//!
//! The palm detection network looks at a whole (letterboxed) frame and reports palm bounding
//! boxes together with 7 keypoints each. The hand landmark network is then run on a region
//! derived from each palm.

use std::path::Path;

use anyhow::bail;

use crate::{
    detection::{
        nms::NonMaxSuppression,
        ssd::{Anchor, Anchors, LayerInfo},
        Detection, Keypoint,
    },
    image::{Image, Resolution},
    nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs},
    rect::{upright_rotation, Rect, RotatedRect},
    timer::Timer,
};

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;
const BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

/// Margin added to each side of a palm box to cover the whole hand, relative to the box size.
const PALM_TO_HAND: f32 = 1.5;

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Runs the palm detection network on whole frames.
pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    threshold: f32,
    t_infer: Timer,
    t_extract: Timer,
}

impl PalmDetector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    /// Loads the palm detection network from an `.onnx` file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::load(path)?;
        Self::new(Cnn::new(
            nn,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?)
    }

    /// Wraps a palm detection [`Cnn`].
    ///
    /// The input resolution has to be divisible by 16.
    pub fn new(cnn: Cnn) -> anyhow::Result<Self> {
        let anchors = palm_anchors(cnn.input_resolution())?;
        Ok(Self {
            cnn,
            anchors,
            nms: NonMaxSuppression::new(),
            threshold: Self::DEFAULT_THRESHOLD,
            t_infer: Timer::new("palm"),
            t_extract: Timer::new("extract"),
        })
    }

    /// Sets the minimum confidence of reported palms.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.cnn.input_resolution()
    }

    /// Detects palms in `image`.
    ///
    /// Returned detections use `image` pixel coordinates and are ordered by descending
    /// confidence.
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.cnn.input_resolution();

        // If the image's aspect ratio doesn't match the network input, sample an oversized region
        // that does. The part outside of the image is black.
        let frame = Rect::from_top_left(0.0, 0.0, image.width() as f32, image.height() as f32);
        let region = frame.grow_to_fit_aspect(self.cnn.input_aspect_ratio());
        let outputs = self
            .t_infer
            .time(|| self.cnn.estimate_region(image, &region.into()))?;

        let _guard = self.t_extract.start();
        let detections = extract(&outputs, input_res, &self.anchors, self.threshold)?;
        let mut detections = self.nms.process(detections);

        let scale = region.width() / input_res.width() as f32;
        for det in &mut detections {
            det.map_coords(scale, region.top_left());
        }
        Ok(detections)
    }

    pub fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_infer, &self.t_extract]
    }
}

/// Computes the anchors of the palm detection network: 2 boxes per cell of a 1/8 scale feature
/// map, and 6 per cell of a 1/16 scale one.
fn palm_anchors(input_res: Resolution) -> anyhow::Result<Anchors> {
    let (w, h) = (input_res.width(), input_res.height());
    if w % 16 != 0 || h % 16 != 0 {
        bail!("palm detection input resolution {input_res} is not a multiple of 16");
    }
    Ok(Anchors::calculate(&[
        LayerInfo::new(2, w / 8, h / 8),
        LayerInfo::new(6, w / 16, h / 16),
    ]))
}

/// Decodes all detections with confidence of at least `threshold`, in network input coordinates.
fn extract(
    outputs: &Outputs,
    input_res: Resolution,
    anchors: &Anchors,
    threshold: f32,
) -> anyhow::Result<Vec<Detection>> {
    let num_anchors = anchors.anchor_count();
    let find = |params: usize| {
        outputs
            .iter()
            .find(|t| t.shape() == [1, num_anchors, params])
    };
    let (Some(boxes), Some(scores)) = (find(BOX_PARAMS), find(1)) else {
        bail!(
            "palm detection network outputs {:?} do not match {} anchors",
            outputs.iter().map(|t| t.shape()).collect::<Vec<_>>(),
            num_anchors,
        );
    };

    let detections = scores
        .as_slice()
        .iter()
        .enumerate()
        .filter_map(|(index, &score)| {
            let confidence = sigmoid(score);
            if confidence < threshold {
                return None;
            }
            let params = &boxes.as_slice()[index * BOX_PARAMS..(index + 1) * BOX_PARAMS];
            Some(extract_detection(
                &anchors[index],
                input_res,
                params,
                confidence,
            ))
        })
        .collect();
    Ok(detections)
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let x_offset = anchor.x_center() * input_res.width() as f32;
    let y_offset = anchor.y_center() * input_res.height() as f32;

    let xc = box_params[0] + x_offset;
    let yc = box_params[1] + y_offset;
    let (w, h) = (box_params[2], box_params[3]);
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| Keypoint::new(xy[0] + x_offset, xy[1] + y_offset))
        .collect::<Vec<_>>();

    let finger = keypoints[PalmKeypoint::MiddleFingerMcp as usize].to_vector();
    let wrist = keypoints[PalmKeypoint::Wrist as usize].to_vector();

    let mut det = Detection::with_keypoints(confidence, Rect::from_center(xc, yc, w, h), keypoints);
    det.set_angle(upright_rotation(finger, wrist));
    det
}

/// Computes the region the hand landmark network should look at for a detected palm.
///
/// The palm box is enlarged to cover the fingers, and rotated so that the fingers point up.
pub fn hand_region(palm: &Detection) -> RotatedRect {
    RotatedRect::new(palm.bounding_rect().grow_rel(PALM_TO_HAND), palm.angle())
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    use crate::nn::Tensor;

    use super::*;

    const INPUT: Resolution = Resolution::new(192, 192);

    /// Outputs with a single confident palm at `anchor`, 20x20 pixels large, fingers pointing up.
    fn outputs(anchors: &Anchors, anchor: usize, logit: f32) -> Outputs {
        let n = anchors.anchor_count();
        let mut scores = vec![-10.0; n];
        scores[anchor] = logit;

        let mut boxes = vec![0.0; n * BOX_PARAMS];
        let params = &mut boxes[anchor * BOX_PARAMS..(anchor + 1) * BOX_PARAMS];
        params[..4].copy_from_slice(&[1.0, 2.0, 20.0, 20.0]);
        // wrist below, middle finger MCP above the anchor
        params[4..6].copy_from_slice(&[0.0, 8.0]);
        params[8..10].copy_from_slice(&[0.0, -8.0]);

        [
            Tensor::new([1, n, BOX_PARAMS], boxes),
            Tensor::new([1, n, 1], scores),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn anchor_count() {
        assert_eq!(palm_anchors(INPUT).unwrap().anchor_count(), 2016);
        assert!(palm_anchors(Resolution::new(100, 100)).is_err());
    }

    #[test]
    fn decodes_detection() {
        let anchors = palm_anchors(INPUT).unwrap();
        let anchor = 2 * 24 + 2 * 5; // cell (5, 1) of the first layer
        let detections = extract(&outputs(&anchors, anchor, 3.0), INPUT, &anchors, 0.5).unwrap();
        assert_eq!(detections.len(), 1);

        let det = &detections[0];
        assert_relative_eq!(det.confidence(), sigmoid(3.0));
        let center = det.bounding_rect().center();
        assert_relative_eq!(center.x, 5.5 * 8.0 + 1.0);
        assert_relative_eq!(center.y, 1.5 * 8.0 + 2.0);
        assert_eq!(det.bounding_rect().width(), 20.0);
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_relative_eq!(det.angle(), 0.0);
    }

    #[test]
    fn applies_threshold() {
        let anchors = palm_anchors(INPUT).unwrap();
        let detections = extract(&outputs(&anchors, 0, -1.0), INPUT, &anchors, 0.5).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn rejects_unexpected_outputs() {
        let anchors = palm_anchors(INPUT).unwrap();
        let bad: Outputs = [Tensor::new([1, 10, 1], vec![0.0; 10])]
            .into_iter()
            .collect();
        let err = extract(&bad, INPUT, &anchors, 0.5).unwrap_err();
        assert!(err.to_string().contains("2016 anchors"), "{err}");
    }

    #[test]
    fn region_covers_hand() {
        let mut palm = Detection::with_keypoints(
            0.9,
            Rect::from_center(100.0, 100.0, 20.0, 20.0),
            vec![Keypoint::new(110.0, 100.0), Keypoint::new(90.0, 100.0)],
        );
        palm.set_angle(-FRAC_PI_2);

        let region = hand_region(&palm);
        assert_eq!(region.rect().width(), 80.0);
        assert_eq!(region.rect().center(), Vector2::new(100.0, 100.0));
        assert_eq!(region.rotation_radians(), -FRAC_PI_2);
    }
}
