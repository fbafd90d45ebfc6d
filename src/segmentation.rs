//! Segmentation orchestrator
//!
//! Drives either backend variant to a pixel-space foreground mask. The matte
//! network path walks an ordered ladder of tensor specs, validating each
//! candidate with a synthetic zero tensor before spending a full encode and a
//! real run on it. The first rung whose validation and real run both succeed
//! produces the result; the rest are never tried.

use crate::codec::{project_mask, resample_mask, CanvasTransform, TensorCodec, TensorSpec};
use crate::config::PipelineConfig;
use crate::error::{PortraitError, Result};
use crate::inference::InferenceBackend;
use crate::types::{BackendKind, CategoryMask, Mask, Tensor, TensorLayout};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use ndarray::ArrayD;

/// External category-mask segmentation capability
pub trait CategorySegmenterCapability: Send {
    /// Whether initialization has completed
    fn is_initialized(&self) -> bool;

    /// Label every pixel of the image
    ///
    /// # Errors
    /// - Segmenter failures
    fn segment(&mut self, image: &RgbaImage) -> Result<CategoryMask>;
}

/// The closed set of segmentation backends
pub enum SegmentationBackend {
    CategoryMaskSegmenter(Box<dyn CategorySegmenterCapability>),
    SingleTensorMatteNetwork(Box<dyn InferenceBackend>),
}

impl SegmentationBackend {
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::CategoryMaskSegmenter(_) => BackendKind::CategoryMaskSegmenter,
            Self::SingleTensorMatteNetwork(_) => BackendKind::SingleTensorMatteNetwork,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        match self {
            Self::CategoryMaskSegmenter(segmenter) => segmenter.is_initialized(),
            Self::SingleTensorMatteNetwork(network) => network.is_initialized(),
        }
    }
}

impl std::fmt::Debug for SegmentationBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CategoryMaskSegmenter(_) => f.write_str("CategoryMaskSegmenter"),
            Self::SingleTensorMatteNetwork(network) => {
                write!(f, "SingleTensorMatteNetwork({})", network.name())
            },
        }
    }
}

/// Orchestrator state within one processing call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Preprocessing,
    Inferring,
    /// Entered from `Inferring` when a ladder candidate failed
    Recovering,
    Postprocessing,
    Done,
    Failed,
}

/// Outcome of one ladder candidate
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub spec: TensorSpec,
    /// `None` when the candidate succeeded
    pub error: Option<String>,
}

impl AttemptRecord {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Mask in source-pixel space plus which backend and layout produced it
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    pub mask: Mask,
    pub backend_used: BackendKind,
    /// `None` for the category segmenter, which takes the bitmap directly
    pub input_layout_used: Option<TensorLayout>,
    pub input_spec: Option<TensorSpec>,
    pub attempts: Vec<AttemptRecord>,
}

/// Per-call segmentation state machine
#[derive(Debug, Clone)]
pub struct SegmentationOrchestrator {
    codec: TensorCodec,
    ladder: Vec<TensorSpec>,
    validate_before_run: bool,
    person_category: u8,
    state: OrchestratorState,
    history: Vec<OrchestratorState>,
    attempts: Vec<AttemptRecord>,
}

impl SegmentationOrchestrator {
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            codec: TensorCodec::from_config(config),
            ladder: TensorSpec::fallback_ladder(config),
            validate_before_run: config.validate_before_run,
            person_category: config.person_category,
            state: OrchestratorState::Idle,
            history: vec![OrchestratorState::Idle],
            attempts: Vec::new(),
        }
    }

    /// Replace the fallback ladder
    #[must_use]
    pub fn with_ladder(mut self, ladder: Vec<TensorSpec>) -> Self {
        self.ladder = ladder;
        self
    }

    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// States visited during the last call, starting at `Idle`
    #[must_use]
    pub fn history(&self) -> &[OrchestratorState] {
        &self.history
    }

    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    #[must_use]
    pub fn ladder(&self) -> &[TensorSpec] {
        &self.ladder
    }

    fn transition(&mut self, state: OrchestratorState) {
        log::trace!("Orchestrator {:?} -> {:?}", self.state, state);
        self.state = state;
        self.history.push(state);
    }

    fn reset(&mut self) {
        self.state = OrchestratorState::Idle;
        self.history = vec![OrchestratorState::Idle];
        self.attempts.clear();
    }

    fn fail(&mut self, error: PortraitError) -> PortraitError {
        self.transition(OrchestratorState::Failed);
        error
    }

    /// Segment an image into a source-pixel foreground mask
    ///
    /// # Errors
    /// - `NotReady` when the backend has not been initialized
    /// - `BackendIncompatible` when every ladder candidate failed
    /// - `UnsupportedOutputShape` when the network output cannot be decoded
    #[tracing::instrument(skip_all, fields(backend = %backend.kind()))]
    pub fn segment(
        &mut self,
        backend: &mut SegmentationBackend,
        image: &DynamicImage,
    ) -> Result<SegmentationResult> {
        self.reset();
        let start = Instant::now();

        if !backend.is_initialized() {
            let err = PortraitError::not_ready(backend.kind().to_string());
            return Err(self.fail(err));
        }

        let result = match backend {
            SegmentationBackend::CategoryMaskSegmenter(segmenter) => {
                self.segment_categories(segmenter.as_mut(), image)
            },
            SegmentationBackend::SingleTensorMatteNetwork(network) => {
                self.segment_matte(network.as_mut(), image)
            },
        };

        match result {
            Ok(result) => {
                self.transition(OrchestratorState::Done);
                log::info!(
                    "Segmentation with {} finished in {:.2}ms ({} attempt(s))",
                    result.backend_used,
                    start.elapsed().as_secs_f64() * 1000.0,
                    result.attempts.len().max(1)
                );
                Ok(result)
            },
            Err(e) => Err(self.fail(e)),
        }
    }

    fn segment_categories(
        &mut self,
        segmenter: &mut dyn CategorySegmenterCapability,
        image: &DynamicImage,
    ) -> Result<SegmentationResult> {
        self.transition(OrchestratorState::Preprocessing);
        let rgba = image.to_rgba8();

        self.transition(OrchestratorState::Inferring);
        let categories = segmenter.segment(&rgba)?;

        self.transition(OrchestratorState::Postprocessing);
        let mask = categories.to_mask(self.person_category);
        let mask = resample_mask(&mask, rgba.width(), rgba.height())?;

        Ok(SegmentationResult {
            mask,
            backend_used: BackendKind::CategoryMaskSegmenter,
            input_layout_used: None,
            input_spec: None,
            attempts: Vec::new(),
        })
    }

    fn segment_matte(
        &mut self,
        network: &mut dyn InferenceBackend,
        image: &DynamicImage,
    ) -> Result<SegmentationResult> {
        let mut last_error = None;

        for spec in self.ladder.clone() {
            match self.try_candidate(network, image, &spec) {
                Ok((output, transform)) => {
                    self.attempts.push(AttemptRecord { spec, error: None });
                    log::debug!("Matte network accepted {spec}");

                    // A decoded shape we cannot interpret is fatal for the call
                    self.transition(OrchestratorState::Postprocessing);
                    let mask = self.codec.decode(&output)?;
                    let mask = project_mask(&mask, &transform)?;

                    return Ok(SegmentationResult {
                        mask,
                        backend_used: BackendKind::SingleTensorMatteNetwork,
                        input_layout_used: Some(spec.layout),
                        input_spec: Some(spec),
                        attempts: self.attempts.clone(),
                    });
                },
                Err(e) => {
                    log::warn!("Matte network rejected {spec}: {e}");
                    self.transition(OrchestratorState::Recovering);
                    self.attempts.push(AttemptRecord {
                        spec,
                        error: Some(e.to_string()),
                    });
                    last_error = Some(e);
                },
            }
        }

        let last_error = last_error
            .unwrap_or_else(|| PortraitError::invalid_config("Fallback ladder is empty"));
        Err(PortraitError::backend_incompatible(
            BackendKind::SingleTensorMatteNetwork,
            self.attempts.len(),
            last_error,
        ))
    }

    /// Validate one ladder candidate with a zero tensor, then run the real input
    fn try_candidate(
        &mut self,
        network: &mut dyn InferenceBackend,
        image: &DynamicImage,
        spec: &TensorSpec,
    ) -> Result<(ArrayD<f32>, CanvasTransform)> {
        if self.validate_before_run {
            self.transition(OrchestratorState::Preprocessing);
            let probe = Tensor::zeros(&spec.dims(), spec.layout);
            self.transition(OrchestratorState::Inferring);
            network.run(&probe)?;
            log::debug!("Validation inference passed for {spec}");
        }

        self.transition(OrchestratorState::Preprocessing);
        let encoded = self.codec.encode(image, spec)?;

        self.transition(OrchestratorState::Inferring);
        let output = network.run(&encoded.tensor)?;
        Ok((output, encoded.transform))
    }
}
