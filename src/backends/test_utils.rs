//! Test utilities and mock capabilities
//!
//! Mock implementations of the inference backend, face detector and category
//! segmenter so the pipeline can be exercised without model files or a
//! native runtime.

use crate::{
    config::PipelineConfig,
    detection::{FaceDetectorCapability, RunningMode},
    error::{PortraitError, Result},
    inference::InferenceBackend,
    segmentation::CategorySegmenterCapability,
    types::{CategoryMask, Detection, Tensor, TensorLayout},
};
use async_trait::async_trait;
use image::RgbaImage;
use instant::Duration;
use ndarray::{ArrayD, IxDyn};
use std::sync::{Arc, Mutex};

type CallHistory = Arc<Mutex<Vec<String>>>;

fn record(history: &CallHistory, call: String) {
    if let Ok(mut history) = history.lock() {
        history.push(call);
    }
}

fn snapshot(history: &CallHistory) -> Vec<String> {
    history.lock().map(|h| h.clone()).unwrap_or_default()
}

/// Mock matte network with configurable input rejection and output shape
#[derive(Debug, Clone)]
pub struct MockMatteBackend {
    initialized: bool,
    /// Layouts the simulated graph refuses
    pub rejected_layouts: Vec<TensorLayout>,
    /// Input resolutions the simulated graph refuses
    pub rejected_sizes: Vec<usize>,
    /// Fixed output dims; `[1, 1, s, s]` for an `s x s` input when unset
    pub output_dims: Option<Vec<usize>>,
    /// Value written to every output element
    pub output_value: f32,
    should_fail_init: bool,
    call_history: CallHistory,
}

impl MockMatteBackend {
    /// Accepts every input and outputs a full-foreground matte
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            rejected_layouts: Vec::new(),
            rejected_sizes: Vec::new(),
            output_dims: None,
            output_value: 1.0,
            should_fail_init: false,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Already initialized backend
    #[must_use]
    pub fn initialized() -> Self {
        let mut backend = Self::new();
        backend.initialized = true;
        backend
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    /// Initialized backend refusing every input
    #[must_use]
    pub fn new_rejecting_all() -> Self {
        let mut backend = Self::initialized();
        backend.rejected_layouts = vec![TensorLayout::Chw, TensorLayout::Hwc];
        backend
    }

    #[must_use]
    pub fn rejecting_layout(mut self, layout: TensorLayout) -> Self {
        self.rejected_layouts.push(layout);
        self
    }

    #[must_use]
    pub fn rejecting_size(mut self, size: usize) -> Self {
        self.rejected_sizes.push(size);
        self
    }

    #[must_use]
    pub fn with_output_dims(mut self, dims: &[usize]) -> Self {
        self.output_dims = Some(dims.to_vec());
        self
    }

    #[must_use]
    pub fn with_output_value(mut self, value: f32) -> Self {
        self.output_value = value;
        self
    }

    /// Shared handle on the call history, usable after the backend is boxed
    #[must_use]
    pub fn history_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    /// Get the call history for verification in tests
    #[must_use]
    pub fn call_history(&self) -> Vec<String> {
        snapshot(&self.call_history)
    }

    fn input_size(input: &Tensor) -> usize {
        match input.layout() {
            TensorLayout::Chw => input.dims().get(2).copied().unwrap_or(0),
            TensorLayout::Hwc => input.dims().get(1).copied().unwrap_or(0),
        }
    }
}

impl Default for MockMatteBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockMatteBackend {
    fn initialize(
        &mut self,
        _model_bytes: &[u8],
        _config: &PipelineConfig,
    ) -> Result<Option<Duration>> {
        record(&self.call_history, "initialize".to_string());

        if self.should_fail_init {
            return Err(PortraitError::inference(
                "Mock matte backend initialization failed",
            ));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn run(&mut self, input: &Tensor) -> Result<ArrayD<f32>> {
        let size = Self::input_size(input);
        record(&self.call_history, format!("run:{}/{size}", input.layout()));

        if !self.initialized {
            return Err(PortraitError::inference("Mock backend not initialized"));
        }
        if self.rejected_layouts.contains(&input.layout()) {
            return Err(PortraitError::inference(format!(
                "Mock backend rejects {} input",
                input.layout()
            )));
        }
        if self.rejected_sizes.contains(&size) {
            return Err(PortraitError::inference(format!(
                "Mock backend rejects {size}px input"
            )));
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
        "mock-matte"
    }
}

/// Mock face detector returning a fixed detection list
#[derive(Debug, Clone)]
pub struct MockFaceDetector {
    pub initialized: bool,
    pub mode: RunningMode,
    pub detections: Vec<Detection>,
    call_history: CallHistory,
}

impl MockFaceDetector {
    #[must_use]
    pub fn with_detections(detections: Vec<Detection>) -> Self {
        Self {
            initialized: true,
            mode: RunningMode::Image,
            detections,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn uninitialized() -> Self {
        let mut detector = Self::with_detections(Vec::new());
        detector.initialized = false;
        detector
    }

    #[must_use]
    pub fn call_history(&self) -> Vec<String> {
        snapshot(&self.call_history)
    }
}

#[async_trait]
impl FaceDetectorCapability for MockFaceDetector {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn running_mode(&self) -> RunningMode {
        self.mode
    }

    async fn set_running_mode(&mut self, mode: RunningMode) -> Result<()> {
        record(&self.call_history, format!("set_mode:{mode:?}"));
        self.mode = mode;
        Ok(())
    }

    fn detect(&mut self, _image: &RgbaImage) -> Result<Vec<Detection>> {
        record(&self.call_history, "detect".to_string());
        Ok(self.detections.clone())
    }
}

/// Mock category segmenter labelling a fixed grid
#[derive(Debug, Clone)]
pub struct MockCategorySegmenter {
    pub initialized: bool,
    pub categories: CategoryMask,
    call_history: CallHistory,
}

impl MockCategorySegmenter {
    #[must_use]
    pub fn new(categories: CategoryMask) -> Self {
        Self {
            initialized: true,
            categories,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn call_history(&self) -> Vec<String> {
        snapshot(&self.call_history)
    }
}

impl CategorySegmenterCapability for MockCategorySegmenter {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn segment(&mut self, _image: &RgbaImage) -> Result<CategoryMask> {
        record(&self.call_history, "segment".to_string());
        Ok(self.categories.clone())
    }
}
