//! Configuration types for the portrait pipeline

use crate::codec::{MaskActivation, Normalization};
use crate::error::{PortraitError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Where the matting network weights come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    /// Byte-exact HTTP(S) download
    Url(String),
    /// Local ONNX file
    Path(PathBuf),
}

impl ModelSource {
    /// Interpret a CLI/config string: `http(s)://` prefixes are URLs, anything else a path
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::Path(PathBuf::from(value))
        }
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Configuration for the portrait pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Primary tensor resolution (first two ladder entries)
    pub primary_size: u32,

    /// Reduced resolution used by the last ladder entry
    pub fallback_size: u32,

    /// Normalization for the letterboxed ladder entries
    pub normalization: Normalization,

    /// Gray level of the letterbox padding
    pub padding_gray: u8,

    /// Mask values below this become fully transparent
    pub mask_threshold: f32,

    /// Probability/logit handling when decoding matte outputs
    pub mask_activation: MaskActivation,

    /// Category label kept by the category-mask segmenter
    pub person_category: u8,

    /// Side of the square canvas for round badge portraits
    pub badge_size: u32,

    /// Width of the cosmetic ring drawn on circular crops (0 disables it)
    pub ring_width: u32,

    /// Run a synthetic zero tensor before the real input
    pub validate_before_run: bool,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Matting network weights
    pub model: Option<ModelSource>,

    /// Expected SHA-256 of the model bytes, lowercase hex
    pub model_sha256: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary_size: 1024,
            fallback_size: 512,
            normalization: Normalization::Simple,
            padding_gray: 128,
            mask_threshold: 0.5,
            mask_activation: MaskActivation::Auto,
            person_category: 15,
            badge_size: 400,
            ring_width: 4,
            validate_before_run: true,
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            model: None,
            model_sha256: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use badge_portrait::{PipelineConfig, ExecutionProvider};
    ///
    /// let config = PipelineConfig::builder()
    ///     .execution_provider(ExecutionProvider::Cpu)
    ///     .badge_size(512)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.badge_size, 512);
    /// ```
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Tensor sizes out of range or fallback larger than primary
    /// - Mask threshold outside `[0, 1]`
    /// - Badge canvas too small for the ring
    /// - Malformed model checksum
    pub fn validate(&self) -> Result<()> {
        if !(32..=4096).contains(&self.primary_size) {
            return Err(PortraitError::config_value_error(
                "primary tensor size",
                self.primary_size,
                "32-4096",
                Some(1024),
            ));
        }

        if self.fallback_size < 32 || self.fallback_size > self.primary_size {
            return Err(PortraitError::config_value_error(
                "fallback tensor size",
                self.fallback_size,
                "32-primary size",
                Some(512),
            ));
        }

        if !(0.0..=1.0).contains(&self.mask_threshold) {
            return Err(PortraitError::config_value_error(
                "mask threshold",
                self.mask_threshold,
                "0.0-1.0",
                Some(0.5),
            ));
        }

        if !(16..=4096).contains(&self.badge_size) {
            return Err(PortraitError::config_value_error(
                "badge size",
                self.badge_size,
                "16-4096",
                Some(400),
            ));
        }

        if self.ring_width >= self.badge_size / 2 {
            return Err(PortraitError::config_value_error(
                "ring width",
                self.ring_width,
                "0-badge size / 2",
                Some(4),
            ));
        }

        if let Some(checksum) = &self.model_sha256 {
            if checksum.len() != 64 || !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(PortraitError::invalid_config(format!(
                    "Model SHA-256 must be 64 hex characters, got '{checksum}'"
                )));
            }
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PortraitError::invalid_config(format!("Malformed config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PortraitError::file_io_error("read config", path, &e))?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PortraitError::internal(format!("Failed to serialize config: {e}")))
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the primary tensor resolution
    #[must_use]
    pub fn primary_size(mut self, size: u32) -> Self {
        self.config.primary_size = size;
        self
    }

    /// Set the reduced fallback resolution
    #[must_use]
    pub fn fallback_size(mut self, size: u32) -> Self {
        self.config.fallback_size = size;
        self
    }

    /// Set the normalization scheme
    #[must_use]
    pub fn normalization(mut self, normalization: Normalization) -> Self {
        self.config.normalization = normalization;
        self
    }

    /// Set the letterbox padding gray level
    #[must_use]
    pub fn padding_gray(mut self, gray: u8) -> Self {
        self.config.padding_gray = gray;
        self
    }

    /// Set the mask threshold
    #[must_use]
    pub fn mask_threshold(mut self, threshold: f32) -> Self {
        self.config.mask_threshold = threshold;
        self
    }

    /// Set the mask activation handling
    #[must_use]
    pub fn mask_activation(mut self, activation: MaskActivation) -> Self {
        self.config.mask_activation = activation;
        self
    }

    /// Set the category kept by the category-mask segmenter
    #[must_use]
    pub fn person_category(mut self, category: u8) -> Self {
        self.config.person_category = category;
        self
    }

    /// Set the round badge canvas size
    #[must_use]
    pub fn badge_size(mut self, size: u32) -> Self {
        self.config.badge_size = size;
        self
    }

    /// Set the cosmetic ring width
    #[must_use]
    pub fn ring_width(mut self, width: u32) -> Self {
        self.config.ring_width = width;
        self
    }

    /// Enable or disable the validation inference
    #[must_use]
    pub fn validate_before_run(mut self, enabled: bool) -> Self {
        self.config.validate_before_run = enabled;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set both intra and inter threads (0 = auto-detect)
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Set the matting network source
    #[must_use]
    pub fn model(mut self, source: ModelSource) -> Self {
        self.config.model = Some(source);
        self
    }

    /// Set the expected model checksum
    #[must_use]
    pub fn model_sha256<S: Into<String>>(mut self, checksum: S) -> Self {
        self.config.model_sha256 = Some(checksum.into().to_ascii_lowercase());
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any rule checked by [`PipelineConfig::validate`]
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
