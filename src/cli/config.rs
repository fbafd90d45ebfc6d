//! Conversion of CLI arguments into pipeline configuration

use crate::cli::main_impl::{FaceArgs, ModelArgs};
use crate::{
    config::{ModelSource, PipelineConfig},
    download::ModelFetcher,
    processor::BackendType,
    types::{BoundingBox, CoordinateSpace},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use std::path::Path;

/// Parse `x,y,w,h` into a face box
pub(crate) fn parse_face(value: &str) -> std::result::Result<BoundingBox, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in face box '{value}': {e}"))?;

    match parts.as_slice() {
        &[x, y, w, h] => {
            let bbox = BoundingBox::new(x, y, w, h);
            if bbox.is_valid() {
                Ok(bbox)
            } else {
                Err(format!("face box '{value}' must have positive width and height"))
            }
        },
        _ => Err(format!(
            "face box must be x,y,w,h, got {} value(s)",
            parts.len()
        )),
    }
}

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Pipeline configuration from an optional JSON file with model flags on
    /// top, plus the selected inference engine
    pub(crate) fn build(
        config_file: Option<&Path>,
        model: Option<&ModelArgs>,
    ) -> Result<(PipelineConfig, BackendType)> {
        let mut config = match config_file {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        let mut backend_type = BackendType::default();
        if let Some(model) = model {
            let (backend, provider) =
                ExecutionProviderManager::parse_provider_string(&model.execution_provider)
                    .context("Invalid execution provider format")?;
            backend_type = backend;
            config.execution_provider = provider;

            if model.threads > 0 {
                config.intra_threads = model.threads;
                config.inter_threads = model.threads;
            }
            if let Some(source) = &model.model {
                config.model = Some(ModelSource::parse(source));
            }
            if let Some(checksum) = &model.model_sha256 {
                config.model_sha256 = Some(checksum.clone());
            }
            if config.model.is_none() {
                anyhow::bail!("No matte model given. Use --model with a URL or an ONNX file path");
            }
        }

        config.validate().context("Invalid configuration")?;
        Ok((config, backend_type))
    }

    pub(crate) fn fetcher(model: &ModelArgs) -> Result<ModelFetcher> {
        let cache_dir = if model.no_cache {
            None
        } else {
            model
                .cache_dir
                .clone()
                .or_else(ModelFetcher::default_cache_dir)
        };
        Ok(ModelFetcher::new()?.with_cache_dir(cache_dir))
    }

    pub(crate) fn coordinate_space(face: &FaceArgs) -> CoordinateSpace {
        if face.normalized {
            CoordinateSpace::Normalized
        } else {
            CoordinateSpace::Pixels
        }
    }
}
