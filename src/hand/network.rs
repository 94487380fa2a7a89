//! The two-stage ONNX hand detector.
//!
//! A palm detection network locates the hand in the whole frame. The hand landmark network then
//! looks at a rotated crop around the palm, in which the fingers point up, and estimates 21
//! landmarks together with a presence score and a handedness estimate.
//!
//! Once a hand was found, the next frame's crop is derived from the current landmarks, and palm
//! detection only runs again when the landmark network loses the hand.

use std::path::Path;

use nalgebra::Vector2;

use crate::{
    detector::{DetectorOptions, HandDetector},
    image::{Image, Resolution},
    nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs},
    rect::{upright_rotation, RotatedRect},
    timer::Timer,
};

use super::{
    detection::{hand_region, PalmDetector},
    landmark::{HandLandmarks, Handedness, Landmark, LandmarkIdx, NUM_LANDMARKS},
};

/// Padding added to each side of the landmarks' bounding box to get the next frame's crop.
const ROI_PADDING: f32 = 0.3;

/// Runs the hand landmark network on a region of a frame.
pub struct LandmarkNetwork {
    cnn: Cnn,
    t_infer: Timer,
}

/// Landmarks estimated in a region, mapped back into the frame.
#[derive(Debug, Clone)]
pub struct RegionEstimate {
    pub hand: HandLandmarks,
    /// The crop to use for the same hand in the next frame.
    pub next_region: RotatedRect,
}

impl LandmarkNetwork {
    /// Loads the network from an `.onnx` file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::load(path)?;
        Ok(Self::new(Cnn::new(
            nn,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?))
    }

    pub fn new(cnn: Cnn) -> Self {
        Self {
            cnn,
            t_infer: Timer::new("landmarks"),
        }
    }

    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.cnn.input_resolution()
    }

    /// Estimates the landmarks of the hand inside `region` of `image`.
    ///
    /// `region` is first grown to the network's aspect ratio. The returned landmarks are
    /// normalized to `image`.
    pub fn estimate(&self, image: &Image, region: &RotatedRect) -> anyhow::Result<RegionEstimate> {
        let view = region.grow_to_fit_aspect(self.cnn.input_aspect_ratio());
        let outputs = self.t_infer.time(|| self.cnn.estimate_region(image, &view))?;
        let hand = extract(&outputs, self.cnn.input_resolution())?;
        Ok(to_frame(hand, &view, image.resolution()))
    }
}

/// Maps landmarks normalized to `view` into landmarks normalized to a frame of size `res`, and
/// computes the region to track them with in the next frame.
fn to_frame(hand: HandLandmarks, view: &RotatedRect, res: Resolution) -> RegionEstimate {
    let size = view.rect().size();
    let pixels: [Vector2<f32>; NUM_LANDMARKS] = std::array::from_fn(|i| {
        let lm = hand.positions()[i];
        view.transform_out(Vector2::new(lm.x * size.x, lm.y * size.y))
    });

    let angle = upright_rotation(
        pixels[LandmarkIdx::MiddleFingerMcp as usize],
        pixels[LandmarkIdx::Wrist as usize],
    );
    let next_region = RotatedRect::bounding(angle, pixels)
        .map_or(*view, |rect| rect.grow_rel(ROI_PADDING));

    let (w, h) = (res.width() as f32, res.height() as f32);
    let positions = pixels.map(|p| Landmark::new(p.x / w, p.y / h));
    RegionEstimate {
        hand: HandLandmarks::new(positions)
            .with_presence(hand.presence())
            .with_handedness(hand.handedness()),
        next_region,
    }
}

/// A [`HandDetector`] running palm detection and hand landmark networks on the CPU.
pub struct HandNetwork {
    palm: PalmDetector,
    landmarks: LandmarkNetwork,
    options: DetectorOptions,
    tracked: Option<RotatedRect>,
}

impl HandNetwork {
    /// Loads both networks from `.onnx` files.
    pub fn load<P: AsRef<Path>, L: AsRef<Path>>(
        palm_model: P,
        landmark_model: L,
        options: DetectorOptions,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(
            PalmDetector::load(palm_model)?,
            LandmarkNetwork::load(landmark_model)?,
            options,
        ))
    }

    pub fn new(
        mut palm: PalmDetector,
        landmarks: LandmarkNetwork,
        options: DetectorOptions,
    ) -> Self {
        palm.set_threshold(options.min_detection());
        Self {
            palm,
            landmarks,
            options,
            tracked: None,
        }
    }

    pub fn palm_detector(&self) -> &PalmDetector {
        &self.palm
    }

    pub fn landmark_network(&self) -> &LandmarkNetwork {
        &self.landmarks
    }

    /// Estimates landmarks in `region`, returning them if the hand is present.
    fn estimate(
        &mut self,
        image: &Image,
        region: &RotatedRect,
    ) -> anyhow::Result<Option<HandLandmarks>> {
        let estimate = self.landmarks.estimate(image, region)?;
        log::trace!(
            "hand presence {:.3} ({:?})",
            estimate.hand.presence(),
            estimate.hand.handedness()
        );

        if estimate.hand.presence() < self.options.min_presence() {
            return Ok(None);
        }
        self.tracked = Some(estimate.next_region);
        Ok(Some(estimate.hand))
    }
}

impl HandDetector for HandNetwork {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
        if let Some(region) = self.tracked.take() {
            if let Some(hand) = self.estimate(image, &region)? {
                return Ok(vec![hand]);
            }
            log::debug!("lost track of hand, running palm detection");
        }

        let palms = self.palm.detect(image)?;
        let mut hands = Vec::new();
        for palm in palms.iter().take(self.options.max_hands()) {
            if let Some(hand) = self.estimate(image, &hand_region(palm))? {
                hands.push(hand);
            }
        }
        Ok(hands)
    }

    fn timers(&self) -> Vec<&Timer> {
        let mut timers = self.palm.timers();
        timers.push(&self.landmarks.t_infer);
        timers
    }
}

fn extract(outputs: &Outputs, input_res: Resolution) -> anyhow::Result<HandLandmarks> {
    if outputs.len() < 3 {
        anyhow::bail!(
            "hand landmark network has {} outputs, expected at least 3",
            outputs.len()
        );
    }

    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];
    let handedness = &outputs[2];

    if screen_landmarks.shape() != [1, NUM_LANDMARKS * 3]
        || presence_flag.shape() != [1, 1]
        || handedness.shape() != [1, 1]
    {
        anyhow::bail!(
            "unexpected hand landmark output shapes {:?}, {:?}, {:?}",
            screen_landmarks.shape(),
            presence_flag.shape(),
            handedness.shape(),
        );
    }

    // Landmarks are in input pixel coordinates, with Z as the third component.
    let coords = screen_landmarks.as_slice();
    let (w, h) = (input_res.width() as f32, input_res.height() as f32);
    let positions: [Landmark; NUM_LANDMARKS] =
        std::array::from_fn(|i| Landmark::new(coords[i * 3] / w, coords[i * 3 + 1] / h));

    let handedness = if handedness.as_slice()[0] > 0.5 {
        Handedness::Right
    } else {
        Handedness::Left
    };

    Ok(HandLandmarks::new(positions)
        .with_presence(presence_flag.as_slice()[0])
        .with_handedness(handedness))
}
