//! Pipeline session state
//!
//! Owns everything that outlives a single processing call: the current source
//! image, its generation counter, the current detections, and the lazily
//! initialized segmentation backends. Results of in-flight work are tagged
//! with the generation they started under so that work finishing after the
//! image changed can be discarded instead of displayed.

use crate::config::PipelineConfig;
use crate::detection::{DetectionAdapter, FaceDetectorCapability};
use crate::error::{PortraitError, Result};
use crate::segmentation::{SegmentationBackend, SegmentationOrchestrator, SegmentationResult};
use crate::types::{BackendKind, Detection};
use image::DynamicImage;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OnceCell};

/// A value produced under a specific image generation
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    pub generation: u64,
    pub value: T,
}

impl<T> Tagged<T> {
    #[must_use]
    pub fn new(generation: u64, value: T) -> Self {
        Self { generation, value }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Tagged<U> {
        Tagged {
            generation: self.generation,
            value: f(self.value),
        }
    }
}

/// Shared handle on an initialized backend. The mutex serializes calls
/// since a session is not guaranteed reentrant.
pub type SharedBackend = Arc<Mutex<SegmentationBackend>>;

/// Initialize-once holder for one backend.
///
/// Concurrent first-use callers await the same initialization. A failed
/// initialization leaves the slot empty, so a later call can retry.
#[derive(Debug)]
pub struct BackendSlot {
    kind: BackendKind,
    cell: OnceCell<SharedBackend>,
}

impl BackendSlot {
    #[must_use]
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            cell: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// The backend, if initialization already completed
    #[must_use]
    pub fn get(&self) -> Option<SharedBackend> {
        self.cell.get().cloned()
    }

    /// Return the backend, running `init` if this is the first use
    ///
    /// # Errors
    /// - Whatever `init` fails with
    /// - `init` producing a backend of a different kind than the slot
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<SharedBackend>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SegmentationBackend>>,
    {
        let kind = self.kind;
        let backend = self
            .cell
            .get_or_try_init(|| async move {
                log::info!("Initializing {kind} backend");
                let backend = init().await?;
                if backend.kind() != kind {
                    return Err(PortraitError::internal(format!(
                        "Slot for {kind} received a {} backend",
                        backend.kind()
                    )));
                }
                Ok(Arc::new(Mutex::new(backend)))
            })
            .await?;
        Ok(Arc::clone(backend))
    }
}

/// Explicit session object replacing global pipeline state
#[derive(Debug)]
pub struct PipelineSession {
    config: Arc<PipelineConfig>,
    generation: AtomicU64,
    image: RwLock<Option<Arc<DynamicImage>>>,
    detections: RwLock<Arc<Vec<Detection>>>,
    matte: BackendSlot,
    segmenter: BackendSlot,
}

fn poisoned<T>(_: T) -> PortraitError {
    PortraitError::internal("Pipeline session lock poisoned")
}

impl PipelineSession {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
            generation: AtomicU64::new(0),
            image: RwLock::new(None),
            detections: RwLock::new(Arc::new(Vec::new())),
            matte: BackendSlot::new(BackendKind::SingleTensorMatteNetwork),
            segmenter: BackendSlot::new(BackendKind::CategoryMaskSegmenter),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Slot for the given backend variant
    #[must_use]
    pub fn slot(&self, kind: BackendKind) -> &BackendSlot {
        match kind {
            BackendKind::SingleTensorMatteNetwork => &self.matte,
            BackendKind::CategoryMaskSegmenter => &self.segmenter,
        }
    }

    /// Current image generation
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Replace the source image. Bumps the generation and clears detections.
    ///
    /// # Errors
    /// - Poisoned session lock
    pub fn set_image(&self, image: DynamicImage) -> Result<u64> {
        // Lock order: image, then detections. Readers never observe the new
        // image paired with the old detections.
        let mut slot = self.image.write().map_err(poisoned)?;
        let mut detections = self.detections.write().map_err(poisoned)?;
        *slot = Some(Arc::new(image));
        *detections = Arc::new(Vec::new());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        drop(detections);
        drop(slot);

        log::debug!("Loaded new source image, generation {generation}");
        Ok(generation)
    }

    /// The current image with the generation it belongs to
    ///
    /// # Errors
    /// - No image loaded yet
    pub fn snapshot(&self) -> Result<Tagged<Arc<DynamicImage>>> {
        let slot = self.image.read().map_err(poisoned)?;
        let image = slot
            .clone()
            .ok_or_else(|| PortraitError::processing("No source image loaded"))?;
        Ok(Tagged::new(self.generation(), image))
    }

    pub fn image(&self) -> Result<Arc<DynamicImage>> {
        Ok(self.snapshot()?.value)
    }

    pub fn clear_detections(&self) -> Result<()> {
        *self.detections.write().map_err(poisoned)? = Arc::new(Vec::new());
        Ok(())
    }

    /// Replace the detection list wholesale.
    ///
    /// Returns `false` and keeps the current list when the detections belong
    /// to an older image.
    pub fn replace_detections(&self, detections: Tagged<Vec<Detection>>) -> Result<bool> {
        let mut current = self.detections.write().map_err(poisoned)?;
        if detections.generation != self.generation() {
            log::debug!(
                "Discarding detections from stale generation {}",
                detections.generation
            );
            return Ok(false);
        }
        *current = Arc::new(detections.value);
        Ok(true)
    }

    pub fn detections(&self) -> Result<Arc<Vec<Detection>>> {
        Ok(Arc::clone(&*self.detections.read().map_err(poisoned)?))
    }

    /// First current detection
    ///
    /// # Errors
    /// - `NoDetection` when the list is empty
    pub fn primary_detection(&self) -> Result<Detection> {
        self.detections()?
            .first()
            .cloned()
            .ok_or(PortraitError::NoDetection)
    }

    /// Unwrap a tagged result if it still belongs to the current image
    pub fn accept<T>(&self, tagged: Tagged<T>) -> Option<T> {
        let current = self.generation();
        if tagged.generation == current {
            Some(tagged.value)
        } else {
            log::info!(
                "Discarding stale result from generation {} (current {current})",
                tagged.generation
            );
            None
        }
    }

    /// Run face detection on the current image and store the result.
    ///
    /// Starting a detection run clears the previous detections.
    pub async fn detect<D: FaceDetectorCapability>(
        &self,
        adapter: &mut DetectionAdapter<D>,
    ) -> Result<Tagged<Vec<Detection>>> {
        let snapshot = self.snapshot()?;
        self.clear_detections()?;

        let rgba = snapshot.value.to_rgba8();
        let detections = adapter.detect(&rgba).await?;
        let tagged = Tagged::new(snapshot.generation, detections);

        self.replace_detections(tagged.clone())?;
        Ok(tagged)
    }

    /// Segment the current image with an initialized backend.
    ///
    /// # Errors
    /// - `NotReady` when the backend slot is still empty
    /// - Orchestrator failures
    pub async fn segment(&self, kind: BackendKind) -> Result<Tagged<SegmentationResult>> {
        let snapshot = self.snapshot()?;
        self.segment_snapshot(kind, snapshot).await
    }

    /// Segment a previously taken image snapshot.
    ///
    /// Calls against the same backend are serialized; the work itself runs on
    /// the blocking pool. The result carries the snapshot's generation.
    ///
    /// # Errors
    /// - `NotReady` when the backend slot is still empty
    /// - Orchestrator failures
    pub async fn segment_snapshot(
        &self,
        kind: BackendKind,
        snapshot: Tagged<Arc<DynamicImage>>,
    ) -> Result<Tagged<SegmentationResult>> {
        let backend = self
            .slot(kind)
            .get()
            .ok_or_else(|| PortraitError::not_ready(kind.to_string()))?;

        let mut guard = backend.lock_owned().await;
        let config = Arc::clone(&self.config);
        let image = Arc::clone(&snapshot.value);

        let result = tokio::task::spawn_blocking(move || {
            let mut orchestrator = SegmentationOrchestrator::new(&config);
            orchestrator.segment(&mut guard, &image)
        })
        .await
        .map_err(|e| PortraitError::internal(format!("Segmentation task failed: {e}")))??;

        Ok(Tagged::new(snapshot.generation, result))
    }
}
