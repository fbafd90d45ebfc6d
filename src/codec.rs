//! Image ⇄ tensor codec
//!
//! Encoding turns a bitmap into the exact tensor a segmentation model expects:
//! aspect-preserving letterbox (or direct stretch) onto a square canvas, per
//! channel normalization and planar or interleaved layout. Decoding recovers a
//! mask grid from the raw model output and maps it back onto source pixels.

use crate::config::PipelineConfig;
use crate::error::{PortraitError, Result};
use crate::types::{Mask, Tensor, TensorLayout};
use image::{imageops::FilterType, DynamicImage, ImageBuffer, Pixel, Rgb, RgbImage};
use ndarray::{Array4, ArrayD};
use serde::{Deserialize, Serialize};

/// `ImageNet` per-channel mean (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// `ImageNet` per-channel standard deviation (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Color normalization scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Normalization {
    /// `v / 255` into `[0, 1]`
    #[default]
    Simple,
    /// `(v / 255 - mean_c) / std_c`
    ImageNet,
}

impl Normalization {
    /// Normalize one 8-bit channel value
    #[must_use]
    pub fn apply(self, channel: usize, value: u8) -> f32 {
        let v = f32::from(value) / 255.0;
        match self {
            Self::Simple => v,
            Self::ImageNet => {
                let mean = IMAGENET_MEAN.get(channel).copied().unwrap_or(0.0);
                let std = IMAGENET_STD.get(channel).copied().unwrap_or(1.0);
                (v - mean) / std
            },
        }
    }
}

impl std::fmt::Display for Normalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::ImageNet => write!(f, "imagenet"),
        }
    }
}

/// How the source is fitted onto the square canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResizeMode {
    /// Aspect-preserving, centered, gray padding
    Letterbox,
    /// Direct stretch to the canvas, no padding
    Stretch,
}

/// How raw matte values are turned into probabilities.
///
/// Models do not report whether they emit probabilities or logits. `Auto`
/// treats any value outside `[0, 1]` as a logit, which is an approximation: a
/// probability pushed slightly out of range by numeric noise is squashed too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaskActivation {
    /// Per-value range heuristic
    #[default]
    Auto,
    /// Values are probabilities; clamp only
    Probability,
    /// Values are logits; always apply the sigmoid
    Logit,
}

impl MaskActivation {
    /// Map one raw output value to `[0, 1]`. NaN maps to 0.
    #[must_use]
    pub fn apply(self, value: f32) -> f32 {
        if value.is_nan() {
            return 0.0;
        }
        match self {
            Self::Auto => {
                if (0.0..=1.0).contains(&value) {
                    value
                } else {
                    sigmoid(value)
                }
            },
            Self::Probability => value.clamp(0.0, 1.0),
            Self::Logit => sigmoid(value),
        }
    }
}

/// Logistic sigmoid `1 / (1 + e^-x)`
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// One entry of the input format ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub layout: TensorLayout,
    pub size: u32,
    pub normalization: Normalization,
    pub resize: ResizeMode,
}

impl TensorSpec {
    #[must_use]
    pub fn new(
        layout: TensorLayout,
        size: u32,
        normalization: Normalization,
        resize: ResizeMode,
    ) -> Self {
        Self {
            layout,
            size,
            normalization,
            resize,
        }
    }

    /// Tensor dimensions for a batch of one RGB image
    #[must_use]
    pub fn dims(&self) -> [usize; 4] {
        let s = self.size as usize;
        match self.layout {
            TensorLayout::Chw => [1, 3, s, s],
            TensorLayout::Hwc => [1, s, s, 3],
        }
    }

    /// Ordered compatibility ladder: primary layout, alternate layout at the
    /// same resolution, then a reduced resolution with direct stretch
    #[must_use]
    pub fn fallback_ladder(config: &PipelineConfig) -> Vec<Self> {
        vec![
            Self::new(
                TensorLayout::Chw,
                config.primary_size,
                config.normalization,
                ResizeMode::Letterbox,
            ),
            Self::new(
                TensorLayout::Hwc,
                config.primary_size,
                config.normalization,
                ResizeMode::Letterbox,
            ),
            Self::new(
                TensorLayout::Chw,
                config.fallback_size,
                Normalization::Simple,
                ResizeMode::Stretch,
            ),
        ]
    }
}

impl std::fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resize = match self.resize {
            ResizeMode::Letterbox => "letterbox",
            ResizeMode::Stretch => "stretch",
        };
        write!(
            f,
            "{}/{} {} {}",
            self.layout, self.size, resize, self.normalization
        )
    }
}

/// Mapping between source pixels and the square model canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasTransform {
    pub source_width: u32,
    pub source_height: u32,
    pub canvas_size: u32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub content_width: u32,
    pub content_height: u32,
}

impl CanvasTransform {
    /// Aspect-preserving fit: `scale = min(T/W, T/H)`, centered
    pub fn letterbox(source_width: u32, source_height: u32, canvas_size: u32) -> Result<Self> {
        Self::check_dimensions(source_width, source_height, canvas_size)?;

        let target = canvas_size as f32;
        let scale = (target / source_width as f32).min(target / source_height as f32);

        let content_width = ((source_width as f32 * scale).round() as u32).clamp(1, canvas_size);
        let content_height =
            ((source_height as f32 * scale).round() as u32).clamp(1, canvas_size);

        Ok(Self {
            source_width,
            source_height,
            canvas_size,
            scale_x: content_width as f32 / source_width as f32,
            scale_y: content_height as f32 / source_height as f32,
            offset_x: (canvas_size - content_width) / 2,
            offset_y: (canvas_size - content_height) / 2,
            content_width,
            content_height,
        })
    }

    /// Direct stretch onto the whole canvas
    pub fn stretch(source_width: u32, source_height: u32, canvas_size: u32) -> Result<Self> {
        Self::check_dimensions(source_width, source_height, canvas_size)?;
        Ok(Self {
            source_width,
            source_height,
            canvas_size,
            scale_x: canvas_size as f32 / source_width as f32,
            scale_y: canvas_size as f32 / source_height as f32,
            offset_x: 0,
            offset_y: 0,
            content_width: canvas_size,
            content_height: canvas_size,
        })
    }

    fn check_dimensions(source_width: u32, source_height: u32, canvas_size: u32) -> Result<()> {
        if source_width == 0 || source_height == 0 || canvas_size == 0 {
            return Err(PortraitError::processing(format!(
                "Cannot fit a {source_width}x{source_height} image onto a {canvas_size} canvas"
            )));
        }
        Ok(())
    }

    /// Content fills the whole canvas with no padding
    #[must_use]
    pub fn is_stretch(&self) -> bool {
        self.offset_x == 0
            && self.offset_y == 0
            && self.content_width == self.canvas_size
            && self.content_height == self.canvas_size
    }

    #[must_use]
    pub fn source_to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale_x + self.offset_x as f32,
            y * self.scale_y + self.offset_y as f32,
        )
    }

    #[must_use]
    pub fn canvas_to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.offset_x as f32) / self.scale_x,
            (y - self.offset_y as f32) / self.scale_y,
        )
    }
}

/// Encoded model input plus the geometry needed to map its output back
#[derive(Debug, Clone)]
pub struct EncodedInput {
    pub tensor: Tensor,
    pub transform: CanvasTransform,
    pub spec: TensorSpec,
}

/// Image ⇄ tensor codec
#[derive(Debug, Clone, Copy)]
pub struct TensorCodec {
    padding_gray: u8,
    activation: MaskActivation,
}

impl Default for TensorCodec {
    fn default() -> Self {
        Self {
            padding_gray: 128,
            activation: MaskActivation::Auto,
        }
    }
}

impl TensorCodec {
    #[must_use]
    pub fn new(padding_gray: u8, activation: MaskActivation) -> Self {
        Self {
            padding_gray,
            activation,
        }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.padding_gray, config.mask_activation)
    }

    /// Encode an image according to one ladder entry
    ///
    /// # Errors
    /// - Empty source image
    pub fn encode(&self, image: &DynamicImage, spec: &TensorSpec) -> Result<EncodedInput> {
        let _span = tracing::debug_span!("encode", spec = %spec).entered();

        let rgb = image.to_rgb8();
        let (canvas, transform) = match spec.resize {
            ResizeMode::Letterbox => self.letterbox(&rgb, spec.size)?,
            ResizeMode::Stretch => Self::stretch(&rgb, spec.size)?,
        };

        let tensor = Self::canvas_to_tensor(&canvas, spec);
        log::debug!(
            "Encoded {}x{} image as {:?} ({})",
            rgb.width(),
            rgb.height(),
            tensor.dims(),
            spec
        );

        Ok(EncodedInput {
            tensor,
            transform,
            spec: *spec,
        })
    }

    /// Aspect-preserving resize centered on a gray `target x target` canvas
    pub fn letterbox(&self, rgb: &RgbImage, target: u32) -> Result<(RgbImage, CanvasTransform)> {
        let transform = CanvasTransform::letterbox(rgb.width(), rgb.height(), target)?;

        let resized = image::imageops::resize(
            rgb,
            transform.content_width,
            transform.content_height,
            FilterType::Triangle,
        );

        let gray = self.padding_gray;
        let mut canvas = ImageBuffer::from_pixel(target, target, Rgb([gray, gray, gray]));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(transform.offset_x),
            i64::from(transform.offset_y),
        );

        Ok((canvas, transform))
    }

    /// Direct resize to `target x target`
    pub fn stretch(rgb: &RgbImage, target: u32) -> Result<(RgbImage, CanvasTransform)> {
        let transform = CanvasTransform::stretch(rgb.width(), rgb.height(), target)?;
        let canvas = image::imageops::resize(rgb, target, target, FilterType::Triangle);
        Ok((canvas, transform))
    }

    /// Normalize a square RGB canvas into the layout of `spec`
    #[must_use]
    pub fn canvas_to_tensor(canvas: &RgbImage, spec: &TensorSpec) -> Tensor {
        let size = canvas.width().min(canvas.height()) as usize;
        let normalization = spec.normalization;
        let channel = |x: usize, y: usize, c: usize| -> f32 {
            let value = canvas
                .get_pixel(x as u32, y as u32)
                .channels()
                .get(c)
                .copied()
                .unwrap_or(0);
            normalization.apply(c, value)
        };

        let array = match spec.layout {
            TensorLayout::Chw => {
                Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| channel(x, y, c))
            },
            TensorLayout::Hwc => {
                Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| channel(x, y, c))
            },
        };

        Tensor::new(array.into_dyn(), spec.layout)
    }

    /// Mask grid `(height, width)` for an output of rank 2, 3 or 4
    ///
    /// # Errors
    /// - `UnsupportedOutputShape` for any other rank
    pub fn mask_dimensions(dims: &[usize]) -> Result<(usize, usize)> {
        let (height, width) = match *dims {
            [_, _, h, w] | [_, h, w] | [h, w] => (h, w),
            _ => return Err(PortraitError::unsupported_output_shape(dims)),
        };

        if height == 0 || width == 0 {
            return Err(PortraitError::processing(format!(
                "Output tensor has an empty mask grid: {dims:?}"
            )));
        }
        Ok((height, width))
    }

    /// Decode a raw model output into a mask on the model's grid
    ///
    /// # Errors
    /// - `UnsupportedOutputShape` for ranks other than 2, 3 or 4
    /// - Output holding fewer values than its mask grid
    pub fn decode(&self, output: &ArrayD<f32>) -> Result<Mask> {
        let (height, width) = Self::mask_dimensions(output.shape())?;
        let count = height * width;
        if output.len() < count {
            return Err(PortraitError::processing(format!(
                "Output tensor holds {} values, mask grid needs {count}",
                output.len()
            )));
        }

        // First channel of the first batch entry
        let values: Vec<f32> = output
            .iter()
            .take(count)
            .map(|&v| self.activation.apply(v))
            .collect();

        let width = u32::try_from(width)
            .map_err(|_| PortraitError::processing("Mask width exceeds u32"))?;
        let height = u32::try_from(height)
            .map_err(|_| PortraitError::processing("Mask height exceeds u32"))?;
        Mask::new(values, width, height)
    }
}

/// Nearest-neighbour mask index: `floor(pixel * mask_dim / pixel_dim)`,
/// clamped to `mask_dim - 1`
#[must_use]
pub fn mask_index(pixel: u32, pixel_dim: u32, mask_dim: u32) -> u32 {
    if pixel_dim == 0 || mask_dim == 0 {
        return 0;
    }
    let index = u64::from(pixel) * u64::from(mask_dim) / u64::from(pixel_dim);
    index.min(u64::from(mask_dim - 1)) as u32
}

/// Resample a mask onto a `width x height` pixel grid
///
/// # Errors
/// - Empty destination grid
pub fn resample_mask(mask: &Mask, width: u32, height: u32) -> Result<Mask> {
    if mask.dimensions() == (width, height) {
        return Ok(mask.clone());
    }
    if width == 0 || height == 0 {
        return Err(PortraitError::processing(format!(
            "Cannot resample mask onto an empty {width}x{height} grid"
        )));
    }

    let (mask_width, mask_height) = mask.dimensions();
    let values = mask.values();
    let mut resampled = Vec::with_capacity(width as usize * height as usize);

    for y in 0..height {
        let row = mask_index(y, height, mask_height) as usize * mask_width as usize;
        for x in 0..width {
            let index = row + mask_index(x, width, mask_width) as usize;
            resampled.push(values.get(index).copied().unwrap_or(0.0));
        }
    }

    Mask::new(resampled, width, height)
}

/// Map a mask produced on the model canvas back onto source pixels.
///
/// Stretched inputs use the plain nearest-neighbour mapping; letterboxed
/// inputs go through the canvas transform so the padding is skipped.
pub fn project_mask(mask: &Mask, transform: &CanvasTransform) -> Result<Mask> {
    if transform.is_stretch() {
        return resample_mask(mask, transform.source_width, transform.source_height);
    }

    let (mask_width, mask_height) = mask.dimensions();
    let canvas = transform.canvas_size as f32;
    let cell = |canvas_coord: f32, mask_dim: u32| -> usize {
        let index = (canvas_coord * mask_dim as f32 / canvas).floor();
        index.clamp(0.0, (mask_dim - 1) as f32) as usize
    };

    let values = mask.values();
    let (width, height) = (transform.source_width, transform.source_height);
    let mut projected = Vec::with_capacity(width as usize * height as usize);

    for y in 0..height {
        for x in 0..width {
            let (cx, cy) = transform.source_to_canvas(x as f32, y as f32);
            let index = cell(cy, mask_height) * mask_width as usize + cell(cx, mask_width);
            projected.push(values.get(index).copied().unwrap_or(0.0));
        }
    }

    Mask::new(projected, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_letterbox_transform_landscape() {
        let transform = CanvasTransform::letterbox(800, 600, 1024).unwrap();
        assert_eq!(transform.content_width, 1024);
        assert_eq!(transform.content_height, 768);
        assert_eq!(transform.offset_x, 0);
        assert_eq!(transform.offset_y, 128);
        assert!((transform.scale_x - 1.28).abs() < 1e-6);
        assert!(!transform.is_stretch());
    }

    #[test]
    fn test_letterbox_pads_with_gray() {
        let codec = TensorCodec::default();
        let rgb = solid_image(200, 100, [255, 0, 0]).to_rgb8();
        let (canvas, transform) = codec.letterbox(&rgb, 64).unwrap();

        assert_eq!(canvas.dimensions(), (64, 64));
        assert_eq!(transform.offset_y, 16);
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([128, 128, 128]));
        assert_eq!(canvas.get_pixel(32, 32), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(32, 63), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_chw_and_hwc_layouts() {
        let codec = TensorCodec::default();
        let image = solid_image(10, 10, [255, 0, 51]);

        let chw_spec = TensorSpec::new(
            TensorLayout::Chw,
            8,
            Normalization::Simple,
            ResizeMode::Stretch,
        );
        let chw = codec.encode(&image, &chw_spec).unwrap().tensor;
        assert_eq!(chw.dims(), &[1, 3, 8, 8]);
        assert!((chw.data()[IxDyn(&[0, 0, 3, 3])] - 1.0).abs() < 1e-6);
        assert!(chw.data()[IxDyn(&[0, 1, 3, 3])].abs() < 1e-6);
        assert!((chw.data()[IxDyn(&[0, 2, 3, 3])] - 0.2).abs() < 1e-6);

        let hwc_spec = TensorSpec {
            layout: TensorLayout::Hwc,
            ..chw_spec
        };
        let hwc = codec.encode(&image, &hwc_spec).unwrap().tensor;
        assert_eq!(hwc.dims(), &[1, 8, 8, 3]);
        assert_eq!(hwc.layout(), TensorLayout::Hwc);
        assert!((hwc.data()[IxDyn(&[0, 3, 3, 0])] - 1.0).abs() < 1e-6);
        assert!((hwc.data()[IxDyn(&[0, 3, 3, 2])] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_imagenet_normalization() {
        let value = Normalization::ImageNet.apply(0, 255);
        assert!((value - (1.0 - 0.485) / 0.229).abs() < 1e-5);
        let value = Normalization::ImageNet.apply(2, 0);
        assert!((value - (-0.406 / 0.225)).abs() < 1e-5);
        assert!((Normalization::Simple.apply(1, 51) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_ladder_order() {
        let ladder = TensorSpec::fallback_ladder(&PipelineConfig::default());
        assert_eq!(ladder.len(), 3);
        assert_eq!(ladder[0].to_string(), "CHW/1024 letterbox simple");
        assert_eq!(ladder[1].to_string(), "HWC/1024 letterbox simple");
        assert_eq!(ladder[2].to_string(), "CHW/512 stretch simple");
        assert_eq!(ladder[1].dims(), [1, 1024, 1024, 3]);
    }

    #[test]
    fn test_mask_dimensions_by_rank() {
        assert_eq!(TensorCodec::mask_dimensions(&[1, 1, 32, 48]).unwrap(), (32, 48));
        assert_eq!(TensorCodec::mask_dimensions(&[1, 32, 48]).unwrap(), (32, 48));
        assert_eq!(TensorCodec::mask_dimensions(&[32, 48]).unwrap(), (32, 48));
        assert!(matches!(
            TensorCodec::mask_dimensions(&[1, 1, 1, 32, 48]),
            Err(PortraitError::UnsupportedOutputShape { rank: 5, .. })
        ));
        assert!(matches!(
            TensorCodec::mask_dimensions(&[1024]),
            Err(PortraitError::UnsupportedOutputShape { rank: 1, .. })
        ));
    }

    #[test]
    fn test_decode_keeps_probabilities_and_squashes_logits() {
        let codec = TensorCodec::default();
        let output = ArrayD::from_shape_vec(IxDyn(&[1, 1, 2, 2]), vec![0.0, 0.25, 1.0, 6.0])
            .unwrap();
        let mask = codec.decode(&output).unwrap();

        assert_eq!(mask.dimensions(), (2, 2));
        assert!(mask.values()[0].abs() < f32::EPSILON);
        assert!((mask.values()[1] - 0.25).abs() < f32::EPSILON);
        assert!((mask.values()[2] - 1.0).abs() < f32::EPSILON);
        assert!((mask.values()[3] - sigmoid(6.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sigmoid_range_for_out_of_range_values() {
        for raw in [-12.0_f32, -3.5, -0.001, 1.001, 2.0, 12.0] {
            let activated = MaskActivation::Auto.apply(raw);
            assert!(activated > 0.0 && activated < 1.0, "{raw} -> {activated}");
        }
        for raw in [0.0_f32, 0.3, 0.5, 0.99, 1.0] {
            assert!((MaskActivation::Auto.apply(raw) - raw).abs() < f32::EPSILON);
        }
        assert!((MaskActivation::Logit.apply(0.0) - 0.5).abs() < f32::EPSILON);
        assert!((MaskActivation::Probability.apply(3.0) - 1.0).abs() < f32::EPSILON);
        assert!(MaskActivation::Auto.apply(f32::NAN).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mask_index_never_exceeds_grid() {
        for (pixel_dim, mask_dim) in [(800, 1024), (1024, 320), (7, 3), (1, 1), (333, 512)] {
            for pixel in 0..pixel_dim {
                assert!(mask_index(pixel, pixel_dim, mask_dim) < mask_dim);
            }
        }
        assert_eq!(mask_index(399, 800, 1024), 510);
        assert_eq!(mask_index(799, 800, 400), 399);
    }

    #[test]
    fn test_resample_mask_nearest_neighbour() {
        let mask = Mask::new(vec![0.0, 1.0, 0.5, 0.25], 2, 2).unwrap();
        let resampled = resample_mask(&mask, 4, 4).unwrap();
        assert_eq!(resampled.dimensions(), (4, 4));
        assert_eq!(resampled.get(0, 0), Some(0.0));
        assert_eq!(resampled.get(3, 0), Some(1.0));
        assert_eq!(resampled.get(0, 3), Some(0.5));
        assert_eq!(resampled.get(3, 3), Some(0.25));
    }

    #[test]
    fn test_letterbox_round_trip_within_one_cell() {
        let transform = CanvasTransform::letterbox(800, 600, 1024).unwrap();
        let mask_dim = 256_u32;
        let cell_canvas = transform.canvas_size as f32 / mask_dim as f32;

        for (x, y) in [(0.0, 0.0), (399.0, 299.0), (799.0, 599.0), (123.0, 456.0)] {
            let (cx, cy) = transform.source_to_canvas(x, y);
            let mx = (cx / cell_canvas).floor();
            let my = (cy / cell_canvas).floor();
            let (bx, by) =
                transform.canvas_to_source((mx + 0.5) * cell_canvas, (my + 0.5) * cell_canvas);
            assert!((bx - x).abs() <= cell_canvas / transform.scale_x, "x {x} -> {bx}");
            assert!((by - y).abs() <= cell_canvas / transform.scale_y, "y {y} -> {by}");
        }
    }

    #[test]
    fn test_project_mask_skips_letterbox_padding() {
        // 4x2 source letterboxed onto an 8 canvas: content rows 2..6
        let transform = CanvasTransform::letterbox(4, 2, 8).unwrap();
        assert_eq!(transform.offset_y, 2);

        let mut values = vec![0.0; 64];
        for y in 2..6 {
            for x in 0..8 {
                values[y * 8 + x] = 1.0;
            }
        }
        let mask = Mask::new(values, 8, 8).unwrap();
        let projected = project_mask(&mask, &transform).unwrap();

        assert_eq!(projected.dimensions(), (4, 2));
        assert!(projected.values().iter().all(|v| (*v - 1.0).abs() < f32::EPSILON));
    }
}
