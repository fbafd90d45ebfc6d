//! Shared helpers that do not belong to a single pipeline stage

pub mod providers;

pub use providers::{ExecutionProviderManager, ProviderInfo};
