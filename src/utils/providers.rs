//! Backend and execution provider selection
//!
//! Parses the `backend:provider` strings accepted by the CLI and reports
//! which combinations the current build can actually run.

use crate::{
    config::ExecutionProvider,
    error::{PortraitError, Result},
    processor::BackendType,
};

/// One backend/provider combination and whether it can run here
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

impl ProviderInfo {
    fn new(
        backend_type: BackendType,
        execution_provider: ExecutionProvider,
        available: bool,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: ExecutionProviderManager::provider_to_string(backend_type, execution_provider),
            backend_type,
            execution_provider,
            available,
            description: description.into(),
        }
    }
}

/// Parsing and listing of execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse a `backend:provider` string such as `onnx:auto` or `tract:cpu`.
    /// A bare backend name selects that backend's default provider.
    ///
    /// # Examples
    /// ```rust
    /// use badge_portrait::utils::ExecutionProviderManager;
    /// use badge_portrait::{BackendType, ExecutionProvider};
    ///
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:cuda")?;
    /// assert_eq!(backend, BackendType::Onnx);
    /// assert_eq!(provider, ExecutionProvider::Cuda);
    /// # Ok::<(), badge_portrait::PortraitError>(())
    /// ```
    ///
    /// # Errors
    /// - Unknown backend or provider names
    /// - Providers the backend cannot drive (Tract is CPU only)
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let normalized = provider_str.trim().to_ascii_lowercase();
        let (backend, provider) = match normalized.split_once(':') {
            Some((backend, provider)) => (backend, Some(provider)),
            None => (normalized.as_str(), None),
        };

        let backend_type = match backend {
            "onnx" => BackendType::Onnx,
            "tract" => BackendType::Tract,
            _ => {
                return Err(PortraitError::invalid_config(format!(
                    "Unknown backend: {backend}. Supported backends: onnx, tract"
                )))
            },
        };

        let Some(provider) = provider else {
            return Ok((backend_type, Self::default_provider_for_backend(backend_type)));
        };

        let execution_provider = match (backend_type, provider) {
            (BackendType::Onnx, "auto") => ExecutionProvider::Auto,
            (BackendType::Onnx, "cuda") => ExecutionProvider::Cuda,
            (BackendType::Onnx, "coreml") => ExecutionProvider::CoreMl,
            (_, "cpu") => ExecutionProvider::Cpu,
            (BackendType::Onnx, other) => {
                return Err(PortraitError::invalid_config(format!(
                    "Unknown ONNX provider: {other}. Supported: auto, cpu, cuda, coreml"
                )))
            },
            (BackendType::Tract, other) => {
                return Err(PortraitError::invalid_config(format!(
                    "Unknown Tract provider: {other}. Tract only supports 'cpu'"
                )))
            },
        };
        Ok((backend_type, execution_provider))
    }

    /// Every combination with its availability in this build
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Self::onnx_providers();
        providers.extend(Self::tract_providers());
        providers
    }

    #[cfg(feature = "onnx")]
    fn onnx_providers() -> Vec<ProviderInfo> {
        use crate::backends::OnnxBackend;
        use std::collections::HashMap;

        let availability: HashMap<String, bool> = OnnxBackend::list_providers()
            .into_iter()
            .map(|(name, available, _)| (name.to_lowercase(), available))
            .collect();
        let is_available = |name: &str| availability.get(name).copied().unwrap_or(false);

        vec![
            ProviderInfo::new(
                BackendType::Onnx,
                ExecutionProvider::Auto,
                availability.values().any(|&available| available),
                "ONNX Runtime with auto-selected provider",
            ),
            ProviderInfo::new(
                BackendType::Onnx,
                ExecutionProvider::Cpu,
                is_available("cpu"),
                "ONNX Runtime CPU execution",
            ),
            ProviderInfo::new(
                BackendType::Onnx,
                ExecutionProvider::Cuda,
                is_available("cuda"),
                "ONNX Runtime CUDA GPU acceleration",
            ),
            ProviderInfo::new(
                BackendType::Onnx,
                ExecutionProvider::CoreMl,
                is_available("coreml"),
                "ONNX Runtime CoreML (Apple Silicon) acceleration",
            ),
        ]
    }

    #[cfg(not(feature = "onnx"))]
    fn onnx_providers() -> Vec<ProviderInfo> {
        [
            ExecutionProvider::Auto,
            ExecutionProvider::Cpu,
            ExecutionProvider::Cuda,
            ExecutionProvider::CoreMl,
        ]
        .into_iter()
        .map(|provider| {
            ProviderInfo::new(
                BackendType::Onnx,
                provider,
                false,
                "ONNX Runtime (feature disabled)",
            )
        })
        .collect()
    }

    #[cfg(feature = "tract")]
    fn tract_providers() -> Vec<ProviderInfo> {
        crate::backends::TractBackend::list_providers()
            .into_iter()
            .map(|(_, available, description)| {
                ProviderInfo::new(
                    BackendType::Tract,
                    ExecutionProvider::Cpu,
                    available,
                    description,
                )
            })
            .collect()
    }

    #[cfg(not(feature = "tract"))]
    fn tract_providers() -> Vec<ProviderInfo> {
        vec![ProviderInfo::new(
            BackendType::Tract,
            ExecutionProvider::Cpu,
            false,
            "Pure Rust CPU inference via Tract (feature disabled)",
        )]
    }

    #[must_use]
    pub fn is_valid_provider_string(provider_str: &str) -> bool {
        Self::parse_provider_string(provider_str).is_ok()
    }

    #[must_use]
    pub fn default_provider_for_backend(backend_type: BackendType) -> ExecutionProvider {
        match backend_type {
            BackendType::Onnx => ExecutionProvider::Auto,
            BackendType::Tract => ExecutionProvider::Cpu,
        }
    }

    /// Inverse of [`Self::parse_provider_string`]
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        let provider_str = match provider {
            ExecutionProvider::Auto => "auto",
            ExecutionProvider::Cpu => "cpu",
            ExecutionProvider::Cuda => "cuda",
            ExecutionProvider::CoreMl => "coreml",
        };
        format!("{backend_type}:{provider_str}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_onnx_providers() {
        for (input, expected) in [
            ("onnx:auto", ExecutionProvider::Auto),
            ("onnx:cpu", ExecutionProvider::Cpu),
            ("onnx:cuda", ExecutionProvider::Cuda),
            ("ONNX:CoreML", ExecutionProvider::CoreMl),
        ] {
            let (backend, provider) =
                ExecutionProviderManager::parse_provider_string(input).unwrap();
            assert_eq!(backend, BackendType::Onnx);
            assert_eq!(provider, expected, "{input}");
        }
    }

    #[test]
    fn test_tract_is_cpu_only() {
        let (backend, provider) =
            ExecutionProviderManager::parse_provider_string("tract:cpu").unwrap();
        assert_eq!(backend, BackendType::Tract);
        assert_eq!(provider, ExecutionProvider::Cpu);

        assert!(ExecutionProviderManager::parse_provider_string("tract:cuda").is_err());
        assert!(ExecutionProviderManager::parse_provider_string("tract:auto").is_err());
    }

    #[test]
    fn test_bare_backend_uses_default_provider() {
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("onnx").unwrap(),
            (BackendType::Onnx, ExecutionProvider::Auto)
        );
        assert_eq!(
            ExecutionProviderManager::parse_provider_string("tract").unwrap(),
            (BackendType::Tract, ExecutionProvider::Cpu)
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(!ExecutionProviderManager::is_valid_provider_string("invalid"));
        assert!(!ExecutionProviderManager::is_valid_provider_string("onnx:invalid"));
        assert!(!ExecutionProviderManager::is_valid_provider_string("mock:cpu"));
    }

    #[test]
    fn test_provider_to_string_inverts_parse() {
        assert_eq!(
            ExecutionProviderManager::provider_to_string(BackendType::Onnx, ExecutionProvider::CoreMl),
            "onnx:coreml"
        );
        let name =
            ExecutionProviderManager::provider_to_string(BackendType::Tract, ExecutionProvider::Cpu);
        assert_eq!(
            ExecutionProviderManager::parse_provider_string(&name).unwrap(),
            (BackendType::Tract, ExecutionProvider::Cpu)
        );
    }

    #[test]
    fn test_list_all_providers() {
        let providers = ExecutionProviderManager::list_all_providers();
        let names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"onnx:auto"));
        assert!(names.contains(&"onnx:coreml"));
        assert!(names.contains(&"tract:cpu"));
        assert!(providers
            .iter()
            .all(|p| ExecutionProviderManager::is_valid_provider_string(&p.name)));
    }
}
