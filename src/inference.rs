//! Inference backend abstraction for the single-tensor matte network

use crate::{config::PipelineConfig, error::Result, types::Tensor};
use ndarray::ArrayD;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends that take one image tensor and return one
/// output tensor.
///
/// Implementations must reject inputs whose layout or resolution the model
/// cannot accept with an error rather than panicking; the segmentation
/// orchestrator relies on that to walk its fallback ladder.
pub trait InferenceBackend: Send {
    /// Load the model from its raw bytes
    ///
    /// Returns the model loading time, or `None` when the backend was already
    /// initialized.
    ///
    /// # Errors
    /// - Model parsing or optimization failures
    /// - Execution provider configuration errors
    fn initialize(&mut self, model_bytes: &[u8], config: &PipelineConfig)
        -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Input layout or resolution rejected by the model
    /// - Tensor conversion failures
    fn run(&mut self, input: &Tensor) -> Result<ArrayD<f32>>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Short backend name used in logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockMatteBackend;
    use crate::types::TensorLayout;

    #[test]
    fn test_backend_trait_object() {
        let mut backend: Box<dyn InferenceBackend> = Box::new(MockMatteBackend::new());
        assert!(!backend.is_initialized());

        let load_time = backend
            .initialize(b"model", &PipelineConfig::default())
            .unwrap();
        assert!(load_time.is_some());
        assert!(backend.is_initialized());

        // Second initialization is a no-op
        let load_time = backend
            .initialize(b"model", &PipelineConfig::default())
            .unwrap();
        assert!(load_time.is_none());

        let output = backend
            .run(&Tensor::zeros(&[1, 3, 16, 16], TensorLayout::Chw))
            .unwrap();
        assert_eq!(output.shape(), &[1, 1, 16, 16]);
    }
}
