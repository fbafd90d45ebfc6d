//! Detection adapter over an external face-detection capability

use crate::error::{PortraitError, Result};
use crate::geometry::normalize_box;
use crate::types::{CoordinateSpace, Detection};
use async_trait::async_trait;
use image::RgbaImage;

/// Running mode of a detector that can serve stills or video frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunningMode {
    #[default]
    Image,
    Video,
}

/// External face-detection capability.
///
/// Implementations wrap the actual network; the adapter only relies on this
/// contract.
#[async_trait]
pub trait FaceDetectorCapability: Send + Sync {
    /// Whether initialization has completed
    fn is_initialized(&self) -> bool;

    fn running_mode(&self) -> RunningMode;

    /// Switch mode. Side-effecting on the detector, and must complete before
    /// the next `detect` call.
    async fn set_running_mode(&mut self, mode: RunningMode) -> Result<()>;

    /// Run detection on a single image
    fn detect(&mut self, image: &RgbaImage) -> Result<Vec<Detection>>;
}

/// Normalizes detector output into source-pixel bounding boxes
#[derive(Debug)]
pub struct DetectionAdapter<D> {
    detector: D,
    space: CoordinateSpace,
}

impl<D: FaceDetectorCapability> DetectionAdapter<D> {
    /// Adapter for a detector reporting natural-image pixels
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            space: CoordinateSpace::Pixels,
        }
    }

    /// Declare the coordinate space the detector reports boxes in
    #[must_use]
    pub fn with_coordinate_space(mut self, space: CoordinateSpace) -> Self {
        self.space = space;
        self
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn into_inner(self) -> D {
        self.detector
    }

    /// Detect faces, returning boxes in source-image pixel space.
    ///
    /// Zero faces is an empty `Vec`, not an error. Boxes that cannot be
    /// normalized onto the image are dropped.
    ///
    /// # Errors
    /// - `NotReady` when the detector has not finished initializing
    /// - Mode switch or detector failures
    #[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub async fn detect(&mut self, image: &RgbaImage) -> Result<Vec<Detection>> {
        if !self.detector.is_initialized() {
            return Err(PortraitError::not_ready("face detector"));
        }

        if self.detector.running_mode() == RunningMode::Video {
            log::debug!("Switching face detector to image mode");
            self.detector.set_running_mode(RunningMode::Image).await?;
        }

        let raw = self.detector.detect(image)?;
        let (width, height) = image.dimensions();

        let detections: Vec<Detection> = raw
            .into_iter()
            .filter_map(|detection| {
                match normalize_box(&detection.bounding_box, self.space, width, height) {
                    Ok(bounding_box) => Some(Detection {
                        bounding_box,
                        ..detection
                    }),
                    Err(e) => {
                        log::warn!("Dropping detection: {e}");
                        None
                    },
                }
            })
            .collect();

        if detections.is_empty() {
            log::info!("No face detected");
        } else {
            log::info!("Detected {} face(s)", detections.len());
        }
        Ok(detections)
    }

    /// First detection, or `NoDetection` when none was found
    pub async fn detect_primary(&mut self, image: &RgbaImage) -> Result<Detection> {
        self.detect(image)
            .await?
            .into_iter()
            .next()
            .ok_or(PortraitError::NoDetection)
    }
}
