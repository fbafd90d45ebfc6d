//! Badge processor
//!
//! `BadgeProcessor` wires the pipeline stages together, one method per user
//! action. Every action works on a snapshot of the session's current image and
//! returns `Ok(None)` when the image changed while it was running, so a stale
//! result never reaches the caller's canvas.

use crate::{
    compositor::Compositor,
    config::PipelineConfig,
    detection::{DetectionAdapter, FaceDetectorCapability},
    download::ModelFetcher,
    error::{PortraitError, Result},
    geometry,
    inference::InferenceBackend,
    segmentation::{CategorySegmenterCapability, SegmentationBackend, SegmentationResult},
    services::OutputKind,
    session::{PipelineSession, Tagged},
    types::{BackendKind, BoundingBox, CoordinateSpace, CropRegion, CropShape, Detection},
};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, span, Instrument, Level};

/// Inference engine used for the matte network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl BackendType {
    /// Whether this build carries the engine
    #[must_use]
    pub fn is_compiled(self) -> bool {
        match self {
            Self::Onnx => cfg!(feature = "onnx"),
            Self::Tract => cfg!(feature = "tract"),
        }
    }
}

impl Default for BackendType {
    fn default() -> Self {
        if cfg!(feature = "onnx") {
            Self::Onnx
        } else {
            Self::Tract
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend of the given type
    ///
    /// # Errors
    /// - Backend types this factory cannot build
    fn create_backend(&self, backend_type: BackendType) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Builds the engines compiled into this crate
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(&self, backend_type: BackendType) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new())),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new())),
            #[allow(unreachable_patterns)]
            other => Err(PortraitError::invalid_config(format!(
                "The {other} backend is not compiled in; enable the '{other}' feature"
            ))),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        [BackendType::Onnx, BackendType::Tract]
            .into_iter()
            .filter(|backend| backend.is_compiled())
            .collect()
    }
}

/// Output of one user action
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub kind: OutputKind,
    pub image: RgbaImage,
    /// Image generation the result was computed from
    pub generation: u64,
    /// Source-image region the output was cut from, if any
    pub region: Option<CropRegion>,
    /// Which backend and tensor format produced the mask, if any
    pub segmentation: Option<SegmentationResult>,
}

impl ProcessedImage {
    /// Download name for this result
    #[must_use]
    pub fn file_name(&self, timestamp_ms: i64) -> String {
        self.kind.file_name(timestamp_ms)
    }
}

/// Runs user actions against a shared [`PipelineSession`]
pub struct BadgeProcessor {
    session: Arc<PipelineSession>,
    compositor: Compositor,
    fetcher: ModelFetcher,
    factory: Box<dyn BackendFactory>,
    backend_type: BackendType,
    show_progress: bool,
}

impl BadgeProcessor {
    /// Create a processor with the default backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    /// - HTTP client setup failures
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory), BackendType::default())
    }

    /// Create a processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    /// - HTTP client setup failures
    pub fn with_factory(
        config: PipelineConfig,
        factory: Box<dyn BackendFactory>,
        backend_type: BackendType,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            compositor: Compositor::from_config(&config),
            session: Arc::new(PipelineSession::new(config)),
            fetcher: ModelFetcher::new()?,
            factory,
            backend_type,
            show_progress: false,
        })
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: ModelFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Show a progress bar while downloading model weights
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<PipelineSession> {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        self.session.config()
    }

    #[must_use]
    pub fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    #[must_use]
    pub fn available_backends(&self) -> Vec<BackendType> {
        self.factory.available_backends()
    }

    /// Replace the source image; results still in flight become stale
    ///
    /// # Errors
    /// - Poisoned session lock
    pub fn load_image(&self, image: DynamicImage) -> Result<u64> {
        self.session.set_image(image)
    }

    /// Run face detection on the current image
    ///
    /// # Errors
    /// - `NotReady` when the detector is still initializing
    /// - Detector failures
    pub async fn detect_faces<D: FaceDetectorCapability>(
        &self,
        adapter: &mut DetectionAdapter<D>,
    ) -> Result<Option<Vec<Detection>>> {
        let tagged = self.session.detect(adapter).await?;
        Ok(self.session.accept(tagged))
    }

    /// Use externally supplied face boxes for the current image
    ///
    /// # Errors
    /// - No image loaded
    /// - Boxes that are degenerate once normalized onto the image
    pub fn set_faces(&self, faces: &[BoundingBox], space: CoordinateSpace) -> Result<usize> {
        let snapshot = self.session.snapshot()?;
        let (width, height) = (snapshot.value.width(), snapshot.value.height());

        let detections = faces
            .iter()
            .map(|bbox| {
                geometry::normalize_box(bbox, space, width, height)
                    .map(|normalized| Detection::new(normalized, 1.0))
            })
            .collect::<Result<Vec<_>>>()?;

        let count = detections.len();
        if !self
            .session
            .replace_detections(Tagged::new(snapshot.generation, detections))?
        {
            return Err(PortraitError::processing(
                "Image changed while setting face boxes",
            ));
        }
        Ok(count)
    }

    /// Fetch the configured matte model and initialize it once.
    /// Concurrent callers share one initialization; a failure can be retried.
    ///
    /// # Errors
    /// - No model configured
    /// - `FetchFailure` for the model bytes
    /// - Backend creation or model loading failures
    pub async fn init_matte_network(&self) -> Result<()> {
        self.session
            .slot(BackendKind::SingleTensorMatteNetwork)
            .get_or_init(|| self.load_matte_network())
            .await?;
        Ok(())
    }

    async fn load_matte_network(&self) -> Result<SegmentationBackend> {
        let config = self.session.config().clone();
        let source = config
            .model
            .clone()
            .ok_or_else(|| PortraitError::invalid_config("No matte model configured"))?;

        let start = Instant::now();
        let bytes = self
            .fetcher
            .fetch(&source, config.model_sha256.as_deref(), self.show_progress)
            .await?;

        let mut backend = self.factory.create_backend(self.backend_type)?;
        let backend = tokio::task::spawn_blocking(move || {
            backend.initialize(&bytes, &config)?;
            Ok::<_, PortraitError>(backend)
        })
        .await
        .map_err(|e| PortraitError::internal(format!("Model loading task failed: {e}")))??;

        log::info!(
            "Matte network ready on {} in {:.2}ms",
            backend.name(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(SegmentationBackend::SingleTensorMatteNetwork(backend))
    }

    /// Install an already initialized matte backend.
    /// Has no effect when the slot is already filled.
    ///
    /// # Errors
    /// - `NotReady` for an uninitialized backend
    pub async fn install_matte_backend(&self, backend: Box<dyn InferenceBackend>) -> Result<()> {
        if !backend.is_initialized() {
            return Err(PortraitError::not_ready(backend.name()));
        }
        self.install(SegmentationBackend::SingleTensorMatteNetwork(backend))
            .await
    }

    /// Install the category-mask segmenter.
    /// Has no effect when the slot is already filled.
    ///
    /// # Errors
    /// - `NotReady` for an uninitialized segmenter
    pub async fn install_segmenter(
        &self,
        segmenter: Box<dyn CategorySegmenterCapability>,
    ) -> Result<()> {
        if !segmenter.is_initialized() {
            return Err(PortraitError::not_ready("category segmenter"));
        }
        self.install(SegmentationBackend::CategoryMaskSegmenter(segmenter))
            .await
    }

    async fn install(&self, backend: SegmentationBackend) -> Result<()> {
        self.session
            .slot(backend.kind())
            .get_or_init(|| async move { Ok(backend) })
            .await?;
        Ok(())
    }

    /// Rectangular 4:3 crop around the first detected face
    ///
    /// # Errors
    /// - `NoDetection` when no face is known for the current image
    pub fn crop_face(&self) -> Result<Option<ProcessedImage>> {
        self.crop_detected(CropShape::Rect)
    }

    /// Circular crop with ring around the first detected face
    ///
    /// # Errors
    /// - `NoDetection` when no face is known for the current image
    pub fn crop_round(&self) -> Result<Option<ProcessedImage>> {
        self.crop_detected(CropShape::Circle)
    }

    fn crop_detected(&self, shape: CropShape) -> Result<Option<ProcessedImage>> {
        let snapshot = self.session.snapshot()?;
        let face = self.session.primary_detection()?.bounding_box;
        let (width, height) = (snapshot.value.width(), snapshot.value.height());

        let (region, kind) = match shape {
            CropShape::Rect => (
                geometry::rect_crop(&face, width, height)?,
                OutputKind::FaceCrop,
            ),
            CropShape::Circle => (
                geometry::circle_crop(&face, width, height)?,
                OutputKind::RoundCrop,
            ),
        };
        let image = self.compositor.crop(&snapshot.value.to_rgba8(), &region)?;

        Ok(self.finish(snapshot.generation, kind, image, Some(region), None))
    }

    /// Remove the background from the whole image.
    ///
    /// The category-mask segmenter yields [`OutputKind::NoBackground`], the
    /// matte network [`OutputKind::Matte`].
    ///
    /// # Errors
    /// - `NotReady` when the backend is not initialized
    /// - Segmentation failures; the source image is left untouched
    #[instrument(skip(self))]
    pub async fn remove_background(&self, backend: BackendKind) -> Result<Option<ProcessedImage>> {
        let snapshot = self.session.snapshot()?;
        let generation = snapshot.generation;
        let rgba = snapshot.value.to_rgba8();

        let segmentation = self.segment(backend, snapshot).await?;
        let image = self.compositor.apply_mask(&rgba, &segmentation.mask)?;

        let kind = match backend {
            BackendKind::CategoryMaskSegmenter => OutputKind::NoBackground,
            BackendKind::SingleTensorMatteNetwork => OutputKind::Matte,
        };
        Ok(self.finish(generation, kind, image, None, Some(segmentation)))
    }

    /// Remove the background, then cut the round badge portrait around the
    /// first detected face
    ///
    /// # Errors
    /// - `NoDetection` when no face is known for the current image
    /// - `NotReady` or segmentation failures
    pub async fn badge_portrait(&self, backend: BackendKind) -> Result<Option<ProcessedImage>> {
        let face = self.session.primary_detection()?.bounding_box;
        self.badge_portrait_from(backend, &face, CoordinateSpace::Pixels)
            .await
    }

    /// [`Self::badge_portrait`] for a caller-supplied face box, e.g. one
    /// measured on a scaled display frame
    ///
    /// # Errors
    /// - Degenerate box after coordinate normalization
    /// - `NotReady` or segmentation failures
    #[instrument(skip(self))]
    pub async fn badge_portrait_from(
        &self,
        backend: BackendKind,
        face: &BoundingBox,
        space: CoordinateSpace,
    ) -> Result<Option<ProcessedImage>> {
        let snapshot = self.session.snapshot()?;
        let generation = snapshot.generation;
        let (width, height) = (snapshot.value.width(), snapshot.value.height());
        let face = geometry::normalize_box(face, space, width, height)?;
        let region = geometry::badge_crop(&face, width, height)?;
        let rgba = snapshot.value.to_rgba8();

        let segmentation = self.segment(backend, snapshot).await?;
        let image = self
            .compositor
            .combined(&rgba, &segmentation.mask, &region)?;

        Ok(self.finish(
            generation,
            OutputKind::BadgePortrait,
            image,
            Some(region),
            Some(segmentation),
        ))
    }

    /// Round badge canvas around the first detected face, keeping the
    /// background
    ///
    /// # Errors
    /// - `NoDetection` when no face is known for the current image
    pub fn round_with_background(&self) -> Result<Option<ProcessedImage>> {
        let face = self.session.primary_detection()?.bounding_box;
        self.round_with_background_from(&face, CoordinateSpace::Pixels)
    }

    /// [`Self::round_with_background`] for a caller-supplied face box
    ///
    /// # Errors
    /// - Degenerate box after coordinate normalization, which is what
    ///   normalized coordinates passed as pixels turn into
    pub fn round_with_background_from(
        &self,
        face: &BoundingBox,
        space: CoordinateSpace,
    ) -> Result<Option<ProcessedImage>> {
        let snapshot = self.session.snapshot()?;
        let (width, height) = (snapshot.value.width(), snapshot.value.height());
        let face = geometry::normalize_box(face, space, width, height)?;
        let region = geometry::round_with_background_crop(&face, width, height)?;

        let image = self.compositor.crop_scaled_circle(
            &snapshot.value.to_rgba8(),
            &region,
            self.compositor.badge_size(),
        )?;

        Ok(self.finish(
            snapshot.generation,
            OutputKind::RoundWithBackground,
            image,
            Some(region),
            None,
        ))
    }

    async fn segment(
        &self,
        backend: BackendKind,
        snapshot: Tagged<Arc<DynamicImage>>,
    ) -> Result<SegmentationResult> {
        let span = span!(Level::DEBUG, "segment", backend = %backend);
        let start = Instant::now();
        let tagged = self
            .session
            .segment_snapshot(backend, snapshot)
            .instrument(span)
            .await?;
        let result = tagged.value;
        log::info!(
            "Segmented with {} ({}) in {:.2}ms after {} attempt(s)",
            result.backend_used,
            result
                .input_spec
                .map_or_else(|| "category mask".to_string(), |spec| spec.to_string()),
            start.elapsed().as_secs_f64() * 1000.0,
            result.attempts.len()
        );
        Ok(result)
    }

    fn finish(
        &self,
        generation: u64,
        kind: OutputKind,
        image: RgbaImage,
        region: Option<CropRegion>,
        segmentation: Option<SegmentationResult>,
    ) -> Option<ProcessedImage> {
        log::debug!(
            "Produced {kind:?} {}x{} for generation {generation}",
            image.width(),
            image.height()
        );
        self.session.accept(Tagged::new(
            generation,
            ProcessedImage {
                kind,
                image,
                generation,
                region,
                segmentation,
            },
        ))
    }
}
