//! Shared fixtures and scripted capabilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use badge_portrait::{
    BoundingBox, CategoryMask, CategorySegmenterCapability, FaceDetectorCapability,
    InferenceBackend, PipelineConfig, PortraitError, Result, RunningMode, Tensor, TensorLayout,
    Detection,
};
use image::{DynamicImage, Rgba, RgbaImage};
use instant::Duration;
use ndarray::{ArrayD, IxDyn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Opaque test portrait with a horizontal gradient
pub fn portrait(width: u32, height: u32) -> DynamicImage {
    let mut image = RgbaImage::new(width, height);
    for (x, _, pixel) in image.enumerate_pixels_mut() {
        let intensity = (x * 255 / width.max(1)) as u8;
        *pixel = Rgba([intensity, 128, 255 - intensity, 255]);
    }
    DynamicImage::ImageRgba8(image)
}

/// The reference face on an 800x600 image
pub fn reference_face() -> BoundingBox {
    BoundingBox::new(300.0, 150.0, 120.0, 160.0)
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig::builder()
        .primary_size(64)
        .fallback_size(32)
        .build()
        .unwrap()
}

/// Matte network that refuses configured layouts and sizes and otherwise
/// returns a constant matte
#[derive(Debug, Clone)]
pub struct ScriptedMatte {
    pub rejected_layouts: Vec<TensorLayout>,
    pub rejected_sizes: Vec<usize>,
    pub output_dims: Option<Vec<usize>>,
    pub output_value: f32,
    pub run_delay: Option<std::time::Duration>,
    initialized: bool,
    calls: CallLog,
}

impl ScriptedMatte {
    pub fn ready() -> Self {
        Self {
            rejected_layouts: Vec::new(),
            rejected_sizes: Vec::new(),
            output_dims: None,
            output_value: 1.0,
            run_delay: None,
            initialized: true,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn uninitialized() -> Self {
        let mut matte = Self::ready();
        matte.initialized = false;
        matte
    }

    pub fn rejecting(mut self, layout: TensorLayout) -> Self {
        self.rejected_layouts.push(layout);
        self
    }

    pub fn with_output_dims(mut self, dims: &[usize]) -> Self {
        self.output_dims = Some(dims.to_vec());
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    fn size(input: &Tensor) -> usize {
        let axis = match input.layout() {
            TensorLayout::Chw => 2,
            TensorLayout::Hwc => 1,
        };
        input.dims().get(axis).copied().unwrap_or(0)
    }
}

impl InferenceBackend for ScriptedMatte {
    fn initialize(
        &mut self,
        model_bytes: &[u8],
        _config: &PipelineConfig,
    ) -> Result<Option<Duration>> {
        self.calls.lock().unwrap().push("initialize".to_string());
        if model_bytes.is_empty() {
            return Err(PortraitError::inference("empty model"));
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn run(&mut self, input: &Tensor) -> Result<ArrayD<f32>> {
        let size = Self::size(input);
        self.calls
            .lock()
            .unwrap()
            .push(format!("run:{}/{size}", input.layout()));

        if let Some(delay) = self.run_delay {
            std::thread::sleep(delay);
        }
        if self.rejected_layouts.contains(&input.layout()) {
            return Err(PortraitError::inference(format!(
                "graph rejects {} input",
                input.layout()
            )));
        }
        if self.rejected_sizes.contains(&size) {
            return Err(PortraitError::inference(format!("graph rejects {size}px")));
        }

        let dims = self
            .output_dims
            .clone()
            .unwrap_or_else(|| vec![1, 1, size, size]);
        Ok(ArrayD::from_elem(IxDyn(&dims), self.output_value))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "scripted-matte"
    }
}

/// Face detector returning a fixed list, counting detect calls
#[derive(Debug)]
pub struct StaticDetector {
    pub mode: RunningMode,
    pub detections: Vec<Detection>,
    pub detect_calls: Arc<AtomicUsize>,
}

impl StaticDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            mode: RunningMode::Video,
            detections,
            detect_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl FaceDetectorCapability for StaticDetector {
    fn is_initialized(&self) -> bool {
        true
    }

    fn running_mode(&self) -> RunningMode {
        self.mode
    }

    async fn set_running_mode(&mut self, mode: RunningMode) -> Result<()> {
        self.mode = mode;
        Ok(())
    }

    fn detect(&mut self, _image: &RgbaImage) -> Result<Vec<Detection>> {
        if self.mode != RunningMode::Image {
            return Err(PortraitError::processing("detector still in video mode"));
        }
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }
}

/// Category segmenter labelling the left half of the grid as person
#[derive(Debug)]
pub struct HalfPersonSegmenter {
    pub width: u32,
    pub height: u32,
}

impl CategorySegmenterCapability for HalfPersonSegmenter {
    fn is_initialized(&self) -> bool {
        true
    }

    fn segment(&mut self, _image: &RgbaImage) -> Result<CategoryMask> {
        let categories = (0..self.height)
            .flat_map(|_| (0..self.width).map(|x| if x < self.width / 2 { 15 } else { 0 }))
            .collect();
        CategoryMask::new(categories, self.width, self.height)
    }
}
