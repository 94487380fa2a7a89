//! Neural Network inference.

use std::{
    fmt,
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use anyhow::Context;
use nalgebra::Vector2;
use tract_onnx::prelude::{
    tract_ndarray, tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact,
    TypedOp,
};

use crate::{
    image::{Color, Image, Resolution},
    rect::{Rect, RotatedRect},
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    shape: CnnInputShape,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input with a shape that matches the given
    /// [`CnnInputShape`].
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn, shape)?;

        Ok(Self {
            nn,
            input_res,
            shape,
            color_mapper,
        })
    }

    fn get_input_res(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        let inputs = nn.input_shapes()?;
        let [tensor_shape] = &inputs[..] else {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                inputs.len(),
            );
        };

        let (w, h) = match (shape, &tensor_shape[..]) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            _ => {
                anyhow::bail!(
                    "invalid model input shape for {:?} CNN: {:?}",
                    shape,
                    tensor_shape,
                );
            }
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        if w == 0 || h == 0 {
            anyhow::bail!("CNN input resolution {w}x{h} is empty");
        }
        Ok(Resolution::new(w, h))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Returns the width-to-height ratio of the input image.
    #[inline]
    pub fn input_aspect_ratio(&self) -> f32 {
        self.input_res.width() as f32 / self.input_res.height() as f32
    }

    /// Runs the network on an input image, returning the estimated outputs.
    ///
    /// The input image will be sampled to create the network's input tensor. If the image's aspect
    /// ratio does not match the network's input aspect ratio, the image will be stretched.
    pub fn estimate(&self, image: &Image) -> anyhow::Result<Outputs> {
        let full = Rect::from_top_left(0.0, 0.0, image.width() as f32, image.height() as f32);
        self.estimate_region(image, &full.into())
    }

    /// Runs the network on the part of `image` covered by `region`.
    ///
    /// `region` is stretched to the network's input resolution and may extend past the image
    /// borders. Samples outside of the image are black.
    pub fn estimate_region(&self, image: &Image, region: &RotatedRect) -> anyhow::Result<Outputs> {
        let tensor = self.region_to_tensor(image, region);
        self.nn.estimate(tensor)
    }

    fn region_to_tensor(&self, image: &Image, region: &RotatedRect) -> tract_onnx::prelude::Tensor {
        let (h, w) = (
            self.input_res.height() as usize,
            self.input_res.width() as usize,
        );
        let sample = |x: usize, y: usize| {
            self.color_mapper
                .map(sample_region(image, region, self.input_res, x as u32, y as u32))
        };

        match self.shape {
            CnnInputShape::NCHW => {
                tract_ndarray::Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| sample(x, y)[c])
                    .into()
            }
            CnnInputShape::NHWC => {
                tract_ndarray::Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| sample(x, y)[c])
                    .into()
            }
        }
    }
}

/// Returns the color of `image` under pixel `(x, y)` of `region` stretched to `res`.
fn sample_region(image: &Image, region: &RotatedRect, res: Resolution, x: u32, y: u32) -> Color {
    let rect = region.rect();
    let inner = Vector2::new(
        (x as f32 + 0.5) / res.width() as f32 * rect.width(),
        (y as f32 + 0.5) / res.height() as f32 * rect.height(),
    );
    let pos = region.transform_out(inner);
    let (sx, sy) = (pos.x.floor(), pos.y.floor());
    if sx < 0.0 || sy < 0.0 || sx >= image.width() as f32 || sy >= image.height() as f32 {
        return Color::BLACK;
    }
    image.get(sx as u32, sy as u32)
}

#[derive(Clone)]
enum ColorMapperKind {
    Linear { target_range: RangeInclusive<f32> },
}

/// Maps sRGB colors to the value range a network expects.
///
/// Only the R, G and B channels are used, in that order; alpha is ignored.
#[derive(Clone)]
pub struct ColorMapper {
    kind: ColorMapperKind,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// The returned object can be passed directly to [`Cnn::new`] as its color map.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let start = *target_range.start();
        let end = *target_range.end();
        assert!(end > start);

        Self {
            kind: ColorMapperKind::Linear { target_range },
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        match &self.kind {
            ColorMapperKind::Linear { target_range } => {
                let start = *target_range.start();
                let end = *target_range.end();

                let adjust_range = (end - start) / 255.0;
                let rgb = [color.r(), color.g(), color.b()];
                rgb.map(|col| col as f32 * adjust_range + start)
            }
        }
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, often fixed at 1.
/// - `C` is the number of color channels, often 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive] // shouldn't be matched on by user code
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone, Debug)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads and optimizes a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path)
            .with_context(|| format!("failed to read network '{}'", path.display()))?;
        Self::from_onnx(&model_data)
            .with_context(|| format!("failed to load network '{}'", path.display()))
    }

    /// Loads and optimizes a pre-trained model from an in-memory ONNX file.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn from_onnx(raw: &[u8]) -> anyhow::Result<Self> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*raw)?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;
        Ok(Self(Arc::new(model)))
    }

    /// Returns the concrete tensor shapes of the network's inputs.
    pub fn input_shapes(&self) -> anyhow::Result<Vec<Vec<usize>>> {
        let model = self.0.model();
        (0..model.inputs.len())
            .map(|id| {
                let fact = model.input_fact(id)?;
                let shape = fact
                    .shape
                    .as_concrete()
                    .with_context(|| format!("network input {id} has a symbolic shape"))?;
                Ok(shape.to_vec())
            })
            .collect()
    }

    /// Runs the network on a single input tensor, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, input: tract_onnx::prelude::Tensor) -> anyhow::Result<Outputs> {
        let outputs = self.0.run(tvec![TValue::from_const(Arc::new(input))])?;
        let inner = outputs
            .iter()
            .map(|value| {
                Ok(Tensor {
                    shape: value.shape().to_vec(),
                    data: value.as_slice::<f32>()?.to_vec(),
                })
            })
            .collect::<anyhow::Result<TVec<_>>>()?;
        Ok(Outputs { inner })
    }
}

/// An `f32` output tensor.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor from its shape and row-major data.
    ///
    /// # Panics
    ///
    /// Panics if the number of elements in `data` does not match `shape`.
    pub fn new(shape: impl Into<Vec<usize>>, data: impl Into<Vec<f32>>) -> Self {
        let (shape, data) = (shape.into(), data.into());
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "tensor data does not match shape {shape:?}"
        );
        Self { shape, data }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor<f32>{:?}", self.shape)
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over the output tensors.
    pub fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.inner.iter()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
        assert_eq!(mapper.map(Color::BLUE), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn samples_region() {
        let mut image = Image::new(4, 4);
        image.clear(Color::WHITE);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            image.set(x, y, Color::RED);
        }
        let res = Resolution::new(2, 2);

        let full = RotatedRect::from(Rect::from_top_left(0.0, 0.0, 4.0, 4.0));
        assert_eq!(sample_region(&image, &full, res, 0, 0), Color::RED);
        assert_eq!(sample_region(&image, &full, res, 1, 1), Color::WHITE);

        // Letterboxed: the left half of the region lies outside of the image.
        let padded = RotatedRect::from(Rect::from_top_left(-4.0, 0.0, 8.0, 4.0));
        assert_eq!(sample_region(&image, &padded, res, 0, 0), Color::BLACK);
        assert_eq!(sample_region(&image, &padded, res, 1, 0), Color::WHITE);

        // A half turn maps the region's bottom right pixel onto the image's top left.
        let flipped = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 4.0, 4.0), PI);
        assert_eq!(sample_region(&image, &flipped, res, 1, 1), Color::RED);
        assert_eq!(sample_region(&image, &flipped, Resolution::new(4, 4), 3, 3), Color::RED);
    }

    #[test]
    fn rejects_non_onnx_path() {
        let err = NeuralNetwork::load("hand_landmark.tflite").unwrap_err();
        assert!(err.to_string().contains("`.onnx` extension"));
    }

    #[test]
    fn rejects_garbage_model() {
        assert!(NeuralNetwork::from_onnx(b"definitely not protobuf").is_err());
    }

    #[test]
    #[should_panic(expected = "does not match shape")]
    fn tensor_shape_mismatch() {
        Tensor::new([1, 63], vec![0.0; 62]);
    }
}
