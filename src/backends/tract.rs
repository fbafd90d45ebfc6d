//! Tract backend for the matte network
//!
//! Pure Rust inference with no native runtime. Tract specializes a graph for a
//! concrete input shape, so the backend keeps the raw model bytes and builds
//! one runnable plan per input shape the orchestrator asks for. A shape the
//! graph cannot accept fails while planning, before anything runs.

use crate::config::PipelineConfig;
use crate::error::{PortraitError, Result};
use crate::inference::InferenceBackend;
use crate::types::Tensor as MatteTensor;
use instant::{Duration, Instant};
use ndarray::ArrayD;
use std::collections::HashMap;
use tract_core::prelude::{Graph, RunnableModel, TypedFact, TypedOp};
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend running the matte network with pure Rust inference
#[derive(Debug, Default)]
pub struct TractBackend {
    model_bytes: Option<Vec<u8>>,
    plans: HashMap<Vec<usize>, TractModel>,
    initialized: bool,
}

impl TractBackend {
    /// List Tract execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 Tract Backend System Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);
        log::debug!("  - Pure Rust: No external dependencies required");

        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan the model for one concrete input shape
    fn plan(model_bytes: &[u8], dims: &[usize]) -> Result<TractModel> {
        let plan_start = Instant::now();
        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| PortraitError::inference(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact(dims.to_vec()).into())
            .map_err(|e| {
                PortraitError::inference(format!("Model rejected input shape {dims:?}: {e}"))
            })?
            .into_optimized()
            .map_err(|e| {
                PortraitError::inference(format!(
                    "Failed to optimize model for input shape {dims:?}: {e}"
                ))
            })?
            .into_runnable()
            .map_err(|e| {
                PortraitError::inference(format!("Failed to create runnable model: {e}"))
            })?;

        log::debug!(
            "Planned Tract model for {dims:?} in {:.2}ms",
            plan_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(model)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(
        &mut self,
        model_bytes: &[u8],
        _config: &PipelineConfig,
    ) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_start = Instant::now();
        log::info!("🚀 Initializing Tract Backend");
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_bytes.len() as f64 / (1024.0 * 1024.0);
        log::info!("📏 Model size: {size_mb:.2} MB");

        // Parse once up front so a corrupt model fails at initialization
        onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| PortraitError::inference(format!("Failed to load ONNX model: {e}")))?;

        self.model_bytes = Some(model_bytes.to_vec());
        self.plans.clear();
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {:.2}ms",
            model_load_time.as_secs_f64() * 1000.0
        );
        Ok(Some(model_load_time))
    }

    fn run(&mut self, input: &MatteTensor) -> Result<ArrayD<f32>> {
        let model_bytes = self
            .model_bytes
            .as_deref()
            .ok_or_else(|| PortraitError::inference("Tract model not initialized"))?;

        let dims = input.dims().to_vec();
        if !self.plans.contains_key(&dims) {
            let plan = Self::plan(model_bytes, &dims)?;
            self.plans.insert(dims.clone(), plan);
        }
        let model = self
            .plans
            .get(&dims)
            .ok_or_else(|| PortraitError::internal("Tract plan missing after insertion"))?;

        log::debug!("🔮 Running Tract inference");
        log::debug!("  - Input tensor: {:?} ({})", dims, input.layout());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.data().clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| PortraitError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| PortraitError::inference("No output tensor found"))?
            .into_arc_tensor();
        let output = output_tensor
            .to_array_view::<f32>()
            .map_err(|e| PortraitError::inference(format!("Failed to convert output tensor: {e}")))?
            .to_owned();

        log::debug!(
            "✅ Tract inference completed in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );
        log::debug!("  - Output tensor: {:?}", output.shape());
        Ok(output)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "tract"
    }
}
