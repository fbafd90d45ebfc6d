//! ONNX Runtime backend for the matte network
//!
//! Runs the single-tensor matte model with ONNX Runtime, using the execution
//! provider requested in the pipeline configuration (CPU, CUDA, `CoreML`).
//! Input tensors of a layout or resolution the graph does not accept are
//! reported as inference errors so the orchestrator can fall back.

use crate::config::{ExecutionProvider, PipelineConfig};
use crate::error::{PortraitError, Result};
use crate::inference::InferenceBackend;
use crate::types::Tensor;
use instant::{Duration, Instant};
use ndarray::ArrayD;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as _,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::value::Value;

/// ONNX Runtime backend for running the matte network
#[derive(Debug, Default)]
pub struct OnnxBackend {
    session: Option<Session>,
    initialized: bool,
}

impl OnnxBackend {
    /// List the ONNX Runtime execution providers as `(name, available, description)`
    ///
    /// # Examples
    /// ```rust
    /// use badge_portrait::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{}: {} - {}", name, if available { "✅" } else { "❌" }, description);
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!(
            "🔍 Probing ONNX Runtime providers on {}/{} ({} cores)",
            std::env::consts::OS,
            std::env::consts::ARCH,
            available_cores(1)
        );

        [
            (ExecutionProvider::Cpu, "CPU", "Always available, runs the matte network on the CPU"),
            (ExecutionProvider::Cuda, "CUDA", "NVIDIA GPU acceleration (needs the CUDA toolkit)"),
            (ExecutionProvider::CoreMl, "CoreML", "Apple GPU / Neural Engine acceleration (macOS only)"),
        ]
        .into_iter()
        .map(|(provider, name, description)| {
            let available = Self::provider_available(provider);
            log::debug!("  - {name}: {}", if available { "available" } else { "unavailable" });
            (name.to_string(), available, description.to_string())
        })
        .collect()
    }

    /// Whether ONNX Runtime can drive `provider` on this machine
    #[must_use]
    pub fn provider_available(provider: ExecutionProvider) -> bool {
        match provider {
            ExecutionProvider::Auto | ExecutionProvider::Cpu => true,
            ExecutionProvider::Cuda => CUDAExecutionProvider::default().is_available().unwrap_or(false),
            ExecutionProvider::CoreMl => CoreMLExecutionProvider::default()
                .is_available()
                .unwrap_or(false),
        }
    }

    /// Create a new uninitialized ONNX backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the accelerators for `requested` in preference order.
    /// Unavailable accelerators are skipped and ONNX Runtime runs on the CPU.
    fn configure_providers(
        session_builder: SessionBuilder,
        requested: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let candidates: &[ExecutionProvider] = match requested {
            ExecutionProvider::Auto => &[ExecutionProvider::Cuda, ExecutionProvider::CoreMl],
            ExecutionProvider::Cpu => &[],
            ExecutionProvider::Cuda => &[ExecutionProvider::Cuda],
            ExecutionProvider::CoreMl => &[ExecutionProvider::CoreMl],
        };

        let mut providers = Vec::new();
        for &candidate in candidates {
            if !Self::provider_available(candidate) {
                if requested != ExecutionProvider::Auto {
                    log::warn!("⚠️ {candidate} execution provider requested but not available, falling back to CPU");
                }
                continue;
            }
            match candidate {
                ExecutionProvider::Cuda => providers.push(CUDAExecutionProvider::default().build()),
                ExecutionProvider::CoreMl => {
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                },
                ExecutionProvider::Auto | ExecutionProvider::Cpu => {},
            }
            log::info!("🚀 Registered {candidate} execution provider");
        }

        if providers.is_empty() {
            log::info!("Running the matte network on the CPU execution provider");
            return Ok(session_builder);
        }
        session_builder
            .with_execution_providers(providers)
            .map_err(|e| {
                PortraitError::inference(format!("Failed to set {requested} execution provider: {e}"))
            })
    }

    fn load_model(&mut self, model_bytes: &[u8], config: &PipelineConfig) -> Result<Duration> {
        let start = Instant::now();

        let session_builder = Session::builder()
            .map_err(|e| PortraitError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                PortraitError::inference(format!("Failed to set optimization level: {e}"))
            })?;
        let session_builder = Self::configure_providers(session_builder, config.execution_provider)?;

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            available_cores(8)
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (available_cores(8) / 4).max(1)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| PortraitError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| PortraitError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(model_bytes)
            .map_err(|e| {
                PortraitError::inference(format!("Failed to create session from model data: {e}"))
            })?;

        let size_mb = model_bytes.len() as f64 / (1024.0 * 1024.0);
        log::debug!(
            "ONNX session ready: {size_mb:.2} MB matte model, provider {}, {intra_threads}/{inter_threads} intra/inter threads",
            config.execution_provider
        );

        self.session = Some(session);
        self.initialized = true;

        let elapsed = start.elapsed();
        log::info!("📊 Matte network loaded in {:.0}ms", elapsed.as_secs_f64() * 1000.0);
        Ok(elapsed)
    }
}

fn available_cores(fallback: usize) -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(fallback)
}

impl InferenceBackend for OnnxBackend {
    fn initialize(
        &mut self,
        model_bytes: &[u8],
        config: &PipelineConfig,
    ) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        self.load_model(model_bytes, config).map(Some)
    }

    fn run(&mut self, input: &Tensor) -> Result<ArrayD<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| PortraitError::inference("ONNX session not initialized"))?;

        let start = Instant::now();
        log::debug!(
            "Running matte network on {} input {:?}",
            input.layout(),
            input.dims()
        );

        let input_value = Value::from_array(input.data().clone()).map_err(|e| {
            PortraitError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs and outputs avoid depending on tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| PortraitError::inference(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .map(ToString::to_string)
            .ok_or_else(|| PortraitError::inference("No output tensors found"))?;
        let output = outputs
            .get(first_key.as_str())
            .ok_or_else(|| PortraitError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| PortraitError::inference(format!("Failed to extract output tensor: {e}")))?
            .to_owned();

        log::info!(
            "📊 Matte inference: {:.2}ms, output {:?}",
            start.elapsed().as_secs_f64() * 1000.0,
            output.shape()
        );
        Ok(output)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TensorLayout;

    #[test]
    fn test_list_providers_always_has_cpu() {
        let providers = OnnxBackend::list_providers();
        assert_eq!(providers.len(), 3);
        assert_eq!(providers[0].0, "CPU");
        assert!(providers[0].1);
    }

    #[test]
    fn test_cpu_and_auto_are_always_available() {
        assert!(OnnxBackend::provider_available(ExecutionProvider::Cpu));
        assert!(OnnxBackend::provider_available(ExecutionProvider::Auto));
    }

    #[test]
    fn test_run_before_initialize_fails() {
        let mut backend = OnnxBackend::new();
        assert!(!backend.is_initialized());
        let err = backend
            .run(&Tensor::zeros(&[1, 3, 8, 8], TensorLayout::Chw))
            .unwrap_err();
        assert!(matches!(err, PortraitError::Inference(_)));
    }

    #[test]
    fn test_initialize_rejects_garbage_model() {
        let mut backend = OnnxBackend::new();
        let result = backend.initialize(b"not an onnx model", &PipelineConfig::default());
        assert!(result.is_err());
        assert!(!backend.is_initialized());
    }
}
