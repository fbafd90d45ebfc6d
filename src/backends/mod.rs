//! Inference backends for the matte network
//!
//! - ONNX Runtime backend (high performance, GPU acceleration)
//! - Tract backend (pure Rust, no external dependencies)

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Mock capabilities for unit tests
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
