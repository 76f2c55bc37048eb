// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Engine registry tests
//!
//! The library engine is resolved from what was loaded at startup; the local
//! engine is loaded on first use, at most once, and retried after a failure.

use async_trait::async_trait;
use image::DynamicImage;
use ocr_service::config::ServiceConfig;
use ocr_service::vision::ocr::{EngineKind, OcrError, PaddleOcrPipeline, RawDetection, Recognizer};
use ocr_service::vision::{EngineLoader, EngineRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct FixedEngine(EngineKind);

impl Recognizer for FixedEngine {
    fn engine(&self) -> EngineKind {
        self.0
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<RawDetection>, OcrError> {
        Ok(Vec::new())
    }
}

/// Slow loader that fails its first `failures` attempts
struct CountingLoader {
    attempts: AtomicUsize,
    failures: usize,
}

impl CountingLoader {
    fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
            failures,
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineLoader for CountingLoader {
    async fn load(&self) -> Result<Arc<dyn Recognizer>, OcrError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if attempt < self.failures {
            return Err(OcrError::ModelLoad("weights unreadable".to_string()));
        }
        Ok(Arc::new(FixedEngine(EngineKind::Local)))
    }
}

#[cfg(test)]
mod engine_registry_tests {
    use super::*;

    /// Test 1: concurrent first requests trigger a single load
    #[tokio::test]
    async fn test_concurrent_first_use_loads_once() {
        let loader = CountingLoader::new(0);
        let registry = Arc::new(EngineRegistry::new(None, loader.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.recognizer(EngineKind::Local).await })
            })
            .collect();

        for handle in handles {
            let recognizer = handle.await.unwrap().unwrap();
            assert_eq!(recognizer.engine(), EngineKind::Local);
        }
        assert_eq!(loader.attempts(), 1);
        assert!(registry.is_local_loaded());
    }

    /// Test 2: a failed load is not cached
    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let loader = CountingLoader::new(1);
        let registry = EngineRegistry::new(None, loader.clone());

        let err = registry.recognizer(EngineKind::Local).await.err().unwrap();
        assert!(matches!(err, OcrError::ModelLoad(_)));
        assert!(!registry.is_local_loaded());

        let recognizer = registry.recognizer(EngineKind::Local).await.unwrap();
        assert_eq!(recognizer.engine(), EngineKind::Local);
        assert_eq!(loader.attempts(), 2);

        registry.recognizer(EngineKind::Local).await.unwrap();
        assert_eq!(loader.attempts(), 2);
    }

    /// Test 3: library engine requests never touch the local loader
    #[tokio::test]
    async fn test_library_engine_resolution() {
        let loader = CountingLoader::new(0);
        let library: Arc<dyn Recognizer> = Arc::new(FixedEngine(EngineKind::Library));
        let registry = EngineRegistry::new(Some(library), loader.clone());

        let recognizer = registry.recognizer(EngineKind::Library).await.unwrap();
        assert_eq!(recognizer.engine(), EngineKind::Library);
        assert_eq!(loader.attempts(), 0);
        assert!(registry.has_library());
    }

    /// Test 4: a missing library engine is a configuration error
    #[tokio::test]
    async fn test_missing_library_engine() {
        let registry = EngineRegistry::new(None, CountingLoader::new(0));

        let err = registry.recognizer(EngineKind::Library).await.err().unwrap();
        assert!(matches!(err, OcrError::Configuration(_)));
    }

    /// Test 5: from_config skips the library engine when disabled
    #[tokio::test]
    async fn test_from_config_with_library_disabled() {
        let config = ServiceConfig {
            disable_library: true,
            ..ServiceConfig::default()
        };

        let registry = EngineRegistry::from_config(&config).await.unwrap();

        assert!(!registry.has_library());
        assert!(!registry.is_local_loaded());
    }

    /// Test 6: from_config fails when the library models are absent
    #[tokio::test]
    async fn test_from_config_missing_library_models() {
        let models = tempfile::TempDir::new().unwrap();
        let config = ServiceConfig {
            library_model_dir: models.path().to_path_buf(),
            ..ServiceConfig::default()
        };

        assert!(EngineRegistry::from_config(&config).await.is_err());
    }

    /// Test 7: engine listing reflects load state
    #[tokio::test]
    async fn test_list_engines_tracks_local_load() {
        let registry = EngineRegistry::new(None, CountingLoader::new(0));

        let before = registry.list_engines();
        assert_eq!(before[1].name, "local");
        assert!(!before[1].loaded);

        registry.recognizer(EngineKind::Local).await.unwrap();

        let after = registry.list_engines();
        assert!(after[1].loaded);
        assert!(!after[0].available);
    }

    /// Test 8: the PaddleOCR pipeline runs end to end on real weights
    ///
    /// Needs `download-models` to have populated OCR_LIBRARY_MODEL_DIR.
    #[test]
    #[ignore]
    fn test_library_pipeline_with_downloaded_models() {
        let dir = std::env::var("OCR_LIBRARY_MODEL_DIR")
            .unwrap_or_else(|_| "./models/paddleocr-onnx".to_string());
        let pipeline = PaddleOcrPipeline::load(&dir).unwrap();

        let page = DynamicImage::new_rgb8(320, 120);
        let detections = pipeline.recognize(&page).unwrap();

        assert!(detections.iter().all(|d| !d.text.is_empty()));
        assert!(detections.iter().all(|d| d.bounding_box.is_some()));
    }
}
