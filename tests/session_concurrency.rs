//! Generation tagging and init-once behaviour of the pipeline session

mod common;

use badge_portrait::{
    BackendFactory, BackendKind, BackendType, BadgeProcessor, Detection, DetectionAdapter,
    InferenceBackend, ModelFetcher, ModelSource, OutputKind, PipelineConfig, PortraitError,
    Result, Tagged,
};
use common::{portrait, reference_face, test_config, ScriptedMatte, StaticDetector};
use futures_util::future::join_all;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Factory handing out scripted matte networks, counting how many it built
struct CountingFactory {
    created: Arc<AtomicUsize>,
}

impl BackendFactory for CountingFactory {
    fn create_backend(&self, _backend_type: BackendType) -> Result<Box<dyn InferenceBackend>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedMatte::uninitialized()))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Onnx]
    }
}

fn processor_with_model(model: &Path) -> Result<(BadgeProcessor, Arc<AtomicUsize>)> {
    let config = PipelineConfig::builder()
        .primary_size(64)
        .fallback_size(32)
        .model(ModelSource::Path(model.to_path_buf()))
        .build()?;
    let created = Arc::new(AtomicUsize::new(0));
    let factory = CountingFactory {
        created: Arc::clone(&created),
    };
    let processor = BadgeProcessor::with_factory(config, Box::new(factory), BackendType::Onnx)?
        .with_fetcher(ModelFetcher::new()?.with_cache_dir(None));
    Ok((processor, created))
}

#[tokio::test]
async fn test_concurrent_first_use_initializes_once() -> Result<()> {
    let dir = TempDir::new()?;
    let model = dir.path().join("matte.onnx");
    std::fs::write(&model, b"weights")?;
    let (processor, created) = processor_with_model(&model)?;

    let results = join_all((0..8).map(|_| processor.init_matte_network())).await;

    assert!(results.iter().all(std::result::Result::is_ok));
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(processor
        .session()
        .slot(BackendKind::SingleTensorMatteNetwork)
        .is_initialized());
    Ok(())
}

#[tokio::test]
async fn test_fetch_failure_is_retryable() -> Result<()> {
    let dir = TempDir::new()?;
    let model = dir.path().join("late.onnx");
    let (processor, created) = processor_with_model(&model)?;

    let err = processor.init_matte_network().await.unwrap_err();
    assert!(matches!(err, PortraitError::FetchFailure { .. }));
    assert!(err.is_backend_local());
    assert_eq!(created.load(Ordering::SeqCst), 0);

    std::fs::write(&model, b"weights")?;
    processor.init_matte_network().await?;
    assert_eq!(created.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_result_for_replaced_image_is_discarded() -> Result<()> {
    let processor = BadgeProcessor::new(test_config())?;
    processor.load_image(portrait(80, 60))?;
    processor
        .install_matte_backend(Box::new(
            ScriptedMatte::ready().with_delay(Duration::from_millis(150)),
        ))
        .await?;

    let (result, new_generation) = tokio::join!(
        processor.remove_background(BackendKind::SingleTensorMatteNetwork),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            processor.load_image(portrait(40, 30))
        }
    );

    assert_eq!(new_generation?, 2);
    assert!(result?.is_none());

    // The same action on the current image goes through
    let output = processor
        .remove_background(BackendKind::SingleTensorMatteNetwork)
        .await?
        .expect("image unchanged");
    assert_eq!(output.generation, 2);
    assert_eq!(output.image.dimensions(), (40, 30));
    Ok(())
}

#[tokio::test]
async fn test_detection_feeds_crops_for_current_image() -> Result<()> {
    let processor = BadgeProcessor::new(PipelineConfig::default())?;
    processor.load_image(portrait(800, 600))?;

    let detector = StaticDetector::new(vec![Detection::new(reference_face(), 0.97)]);
    let calls = Arc::clone(&detector.detect_calls);
    let mut adapter = DetectionAdapter::new(detector);

    let detections = processor
        .detect_faces(&mut adapter)
        .await?
        .expect("image unchanged");
    assert_eq!(detections.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let crop = processor.crop_face()?.expect("image unchanged");
    assert_eq!(crop.kind, OutputKind::FaceCrop);
    assert_eq!(crop.image.dimensions(), (288, 216));

    // A new image clears the detections
    processor.load_image(portrait(800, 600))?;
    assert!(matches!(
        processor.crop_face().unwrap_err(),
        PortraitError::NoDetection
    ));
    Ok(())
}

#[test]
fn test_stale_detections_are_not_stored() -> Result<()> {
    let processor = BadgeProcessor::new(PipelineConfig::default())?;
    let first = processor.load_image(portrait(100, 100))?;
    processor.load_image(portrait(100, 100))?;

    let stored = processor
        .session()
        .replace_detections(Tagged::new(first, vec![Detection::new(reference_face(), 0.9)]))?;
    assert!(!stored);
    assert!(processor.session().detections()?.is_empty());
    Ok(())
}
