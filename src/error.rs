//! Error types for the portrait pipeline

use crate::types::BackendKind;
use thiserror::Error;

/// Result type alias for portrait pipeline operations
pub type Result<T> = std::result::Result<T, PortraitError>;

/// Error taxonomy shared by every pipeline stage
#[derive(Error, Debug)]
pub enum PortraitError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// An external capability was used before its initialization finished.
    /// Callers wait for the initialization event instead of retrying.
    #[error("{capability} is not ready yet")]
    NotReady { capability: String },

    /// Zero faces found where one was required
    #[error("No face detected in the image")]
    NoDetection,

    /// Decoder received an output tensor rank it cannot interpret
    #[error("Unsupported output tensor shape {dims:?} (rank {rank}); expected rank 2, 3 or 4")]
    UnsupportedOutputShape { rank: usize, dims: Vec<usize> },

    /// Every entry of the format/resolution fallback ladder failed
    #[error("Backend {backend} rejected all {attempts} input format(s); last error: {last_error}")]
    BackendIncompatible {
        backend: BackendKind,
        attempts: usize,
        last_error: Box<PortraitError>,
    },

    /// Model bytes could not be retrieved
    #[error("Failed to fetch model from '{source_name}': {reason}")]
    FetchFailure { source_name: String, reason: String },

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bounding boxes or crop regions that cannot produce a crop
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Unsupported file format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Pixel or tensor processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortraitError {
    /// Create a new not-ready error for the named capability
    pub fn not_ready<S: Into<String>>(capability: S) -> Self {
        Self::NotReady {
            capability: capability.into(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid geometry error
    pub fn invalid_geometry<S: Into<String>>(msg: S) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a fetch failure for a model URL or path
    pub fn fetch_failure<S: Into<String>, R: Into<String>>(source_name: S, reason: R) -> Self {
        Self::FetchFailure {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported output shape error from tensor dimensions
    #[must_use]
    pub fn unsupported_output_shape(dims: &[usize]) -> Self {
        Self::UnsupportedOutputShape {
            rank: dims.len(),
            dims: dims.to_vec(),
        }
    }

    /// Create a backend incompatibility error carrying the last underlying failure
    #[must_use]
    pub fn backend_incompatible(backend: BackendKind, attempts: usize, last_error: Self) -> Self {
        Self::BackendIncompatible {
            backend,
            attempts,
            last_error: Box::new(last_error),
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {rec}"),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range}).{recommendation}"
        ))
    }

    /// Whether the failure is confined to a single backend.
    ///
    /// Backend-local failures never abort the whole pipeline: other backends
    /// remain usable after one of them reports one of these.
    #[must_use]
    pub fn is_backend_local(&self) -> bool {
        matches!(
            self,
            Self::BackendIncompatible { .. }
                | Self::FetchFailure { .. }
                | Self::UnsupportedOutputShape { .. }
                | Self::Inference(_)
        )
    }

    /// Whether the caller has to wait for an initialization event first
    #[must_use]
    pub fn requires_initialization(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }

    /// Whether the failure only reports an empty result
    #[must_use]
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::NoDetection)
    }
}
