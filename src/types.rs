//! Core data types shared by the pipeline stages

use crate::error::{PortraitError, Result};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// A detected face region in source-image pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    #[must_use]
    pub fn new(origin_x: f32, origin_y: f32, width: f32, height: f32) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }

    /// Face centroid
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (
            self.origin_x + self.width / 2.0,
            self.origin_y + self.height / 2.0,
        )
    }

    /// Larger side of the box; every crop is sized from it
    #[must_use]
    pub fn face_size(&self) -> f32 {
        self.width.max(self.height)
    }

    /// Finite coordinates and a strictly positive extent
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.origin_x, self.origin_y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// A face landmark, normalized to the displayed image frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

/// One face-detector result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    /// Confidence in `[0, 1]`
    pub score: f32,
    /// Landmarks relative to the displayed frame, not source pixels
    pub keypoints: Vec<Keypoint>,
}

impl Detection {
    /// Create a detection, clamping the score into `[0, 1]`
    #[must_use]
    pub fn new(bounding_box: BoundingBox, score: f32) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            bounding_box,
            score,
            keypoints: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_keypoints(mut self, keypoints: Vec<Keypoint>) -> Self {
        self.keypoints = keypoints;
        self
    }
}

/// Coordinate space a bounding box is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordinateSpace {
    /// Natural-image pixels
    #[default]
    Pixels,
    /// Fractions of the natural image size, `[0, 1]`
    Normalized,
    /// Pixels of a displayed (scaled) rendering of the image
    Display { width: u32, height: u32 },
}

/// Shape of a crop command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropShape {
    Rect,
    Circle,
}

/// A crop command in source-pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub shape: CropShape,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRegion {
    /// Radius of a circular crop (half the square side)
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.width.min(self.height) / 2.0
    }

    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the region lies inside `[0, width] x [0, height]`, allowing
    /// for float rounding
    #[must_use]
    pub fn is_contained_in(&self, width: u32, height: u32) -> bool {
        const EPSILON: f32 = 1e-3;
        self.x >= -EPSILON
            && self.y >= -EPSILON
            && self.x + self.width <= width as f32 + EPSILON
            && self.y + self.height <= height as f32 + EPSILON
    }
}

/// Tensor memory ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TensorLayout {
    /// Planar, channel-major `[1, 3, H, W]`
    Chw,
    /// Interleaved `[1, H, W, 3]`
    Hwc,
}

impl std::fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chw => write!(f, "CHW"),
            Self::Hwc => write!(f, "HWC"),
        }
    }
}

/// Model input/output buffer.
///
/// `data.len() == product(dims)` holds by construction since the buffer is an
/// `ndarray` array.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: ArrayD<f32>,
    layout: TensorLayout,
}

impl Tensor {
    #[must_use]
    pub fn new(data: ArrayD<f32>, layout: TensorLayout) -> Self {
        Self { data, layout }
    }

    /// Zero-filled tensor, used as the synthetic validation input
    #[must_use]
    pub fn zeros(dims: &[usize], layout: TensorLayout) -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(dims)),
            layout,
        }
    }

    #[must_use]
    pub fn dims(&self) -> &[usize] {
        self.data.shape()
    }

    #[must_use]
    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    #[must_use]
    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-pixel foreground likelihood on a mask grid
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl Mask {
    /// Create a mask, checking the value count against the grid size
    pub fn new(values: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize) * (height as usize);
        if width == 0 || height == 0 {
            return Err(PortraitError::processing(format!(
                "Mask grid must be non-empty, got {width}x{height}"
            )));
        }
        if values.len() != expected {
            return Err(PortraitError::processing(format!(
                "Mask has {} values, expected {expected} for {width}x{height}",
                values.len()
            )));
        }
        Ok(Self {
            values,
            width,
            height,
        })
    }

    /// Mask filled with one value
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            values: vec![value; (width as usize) * (height as usize)],
            width,
            height,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at grid position, `None` when out of range
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// Per-pixel integer label map from a category segmenter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMask {
    categories: Vec<u8>,
    width: u32,
    height: u32,
}

impl CategoryMask {
    pub fn new(categories: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize) * (height as usize);
        if width == 0 || height == 0 || categories.len() != expected {
            return Err(PortraitError::processing(format!(
                "Category mask has {} labels, expected {expected} for {width}x{height}",
                categories.len()
            )));
        }
        Ok(Self {
            categories,
            width,
            height,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn categories(&self) -> &[u8] {
        &self.categories
    }

    /// Binary foreground mask keeping only `category`
    #[must_use]
    pub fn to_mask(&self, category: u8) -> Mask {
        Mask {
            values: self
                .categories
                .iter()
                .map(|&c| if c == category { 1.0 } else { 0.0 })
                .collect(),
            width: self.width,
            height: self.height,
        }
    }
}

/// The closed set of segmentation backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    CategoryMaskSegmenter,
    SingleTensorMatteNetwork,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CategoryMaskSegmenter => write!(f, "category-mask segmenter"),
            Self::SingleTensorMatteNetwork => write!(f, "single-tensor matte network"),
        }
    }
}
