#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Badge Portrait
//!
//! Portrait pipeline for identity badges: face-anchored crops, background
//! removal and round badge portraits.
//!
//! ## Pipeline
//!
//! 1. **Detection** ([`detection`]): an external face detector behind
//!    [`FaceDetectorCapability`], with boxes normalized to source pixels
//! 2. **Crop geometry** ([`geometry`]): 4:3 rectangle, circle, badge square
//!    and background-preserving round crops around the face
//! 3. **Tensor codec** ([`codec`]): letterbox or stretch an image into a
//!    CHW/HWC tensor and decode the network output back into a mask
//! 4. **Segmentation** ([`segmentation`]): a category-mask segmenter or a
//!    single-tensor matte network, with a format/resolution fallback ladder
//! 5. **Compositing** ([`compositor`]): alpha masking, crops, ring and the
//!    combined badge portrait
//!
//! [`BadgeProcessor`] wires the stages together per user action on top of a
//! [`PipelineSession`], which tags results with the image generation so that
//! work finishing after the image changed is discarded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use badge_portrait::{
//!     BackendKind, BadgeProcessor, BoundingBox, CoordinateSpace, ModelSource, PipelineConfig,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::builder()
//!     .model(ModelSource::parse("models/matte.onnx"))
//!     .build()?;
//! let processor = BadgeProcessor::new(config)?;
//!
//! processor.load_image(image::open("portrait.jpg")?)?;
//! processor.set_faces(
//!     &[BoundingBox::new(300.0, 150.0, 120.0, 160.0)],
//!     CoordinateSpace::Pixels,
//! )?;
//!
//! processor.init_matte_network().await?;
//! if let Some(badge) = processor
//!     .badge_portrait(BackendKind::SingleTensorMatteNetwork)
//!     .await?
//! {
//!     badge.image.save(badge.file_name(0))?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): Command-line interface and download progress bars
//! - `tracing-json`: JSON log output for the CLI
//! - `webp-support` (default): WebP image format support

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod compositor;
pub mod config;
pub mod detection;
pub mod download;
pub mod error;
pub mod geometry;
pub mod inference;
pub mod processor;
pub mod segmentation;
pub mod services;
pub mod session;
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::*;
pub use codec::{
    CanvasTransform, MaskActivation, Normalization, ResizeMode, TensorCodec, TensorSpec,
};
pub use compositor::Compositor;
pub use config::{ExecutionProvider, ModelSource, PipelineConfig, PipelineConfigBuilder};
pub use detection::{DetectionAdapter, FaceDetectorCapability, RunningMode};
pub use download::{validate_model_url, ModelFetcher};
pub use error::{PortraitError, Result};
pub use inference::InferenceBackend;
pub use processor::{
    BackendFactory, BackendType, BadgeProcessor, DefaultBackendFactory, ProcessedImage,
};
pub use segmentation::{
    AttemptRecord, CategorySegmenterCapability, OrchestratorState, SegmentationBackend,
    SegmentationOrchestrator, SegmentationResult,
};
pub use services::{BadgeVariant, ImageIOService, OutputKind};
pub use session::{BackendSlot, PipelineSession, Tagged};
pub use types::{
    BackendKind, BoundingBox, CategoryMask, CoordinateSpace, CropRegion, CropShape, Detection,
    Keypoint, Mask, Tensor, TensorLayout,
};
pub use utils::{ExecutionProviderManager, ProviderInfo};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_wires_together() {
        let config = PipelineConfig::builder().build().unwrap();
        let processor = BadgeProcessor::new(config).unwrap();
        assert_eq!(processor.session().generation(), 0);
        assert!(!processor
            .session()
            .slot(BackendKind::SingleTensorMatteNetwork)
            .is_initialized());
    }
}
