// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Registry of recognition engines
//!
//! The library engine is loaded once at startup. The local engine is loaded
//! on first use behind a `OnceCell`, so concurrent first requests share one
//! load; a failed load leaves the cell empty and a later request tries again.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::vision::ocr::{EngineKind, LocalModelLoader, OcrError, PaddleOcrPipeline, Recognizer};

/// Produces an engine on first use
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn Recognizer>, OcrError>;
}

/// Availability of one engine, as reported by `GET /`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineInfo {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub loaded: bool,
}

pub struct EngineRegistry {
    library: Option<Arc<dyn Recognizer>>,
    local: OnceCell<Arc<dyn Recognizer>>,
    local_loader: Arc<dyn EngineLoader>,
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("library_loaded", &self.library.is_some())
            .field("local_loaded", &self.local.initialized())
            .finish()
    }
}

impl EngineRegistry {
    pub fn new(library: Option<Arc<dyn Recognizer>>, local_loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            library,
            local: OnceCell::new(),
            local_loader,
        }
    }

    /// Build the registry, eagerly loading the library engine unless disabled
    pub async fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let library: Option<Arc<dyn Recognizer>> = if config.disable_library {
            warn!("Library engine disabled by configuration");
            None
        } else {
            let dir = config.library_model_dir.clone();
            let pipeline = tokio::task::spawn_blocking(move || PaddleOcrPipeline::load(dir)).await??;
            info!("Library engine loaded from {}", pipeline.model_dir().display());
            Some(Arc::new(pipeline))
        };

        let loader = Arc::new(LocalModelLoader::new(config.local_model_dir.clone()));
        Ok(Self::new(library, loader))
    }

    /// Resolve an engine, loading the local model on first use
    pub async fn recognizer(&self, kind: EngineKind) -> Result<Arc<dyn Recognizer>, OcrError> {
        match kind {
            EngineKind::Library => self.library.clone().ok_or_else(|| {
                OcrError::Configuration("library OCR engine is not available".to_string())
            }),
            EngineKind::Local => {
                let recognizer = self
                    .local
                    .get_or_try_init(|| async {
                        info!("Loading local model on first use");
                        self.local_loader.load().await
                    })
                    .await?;
                Ok(recognizer.clone())
            }
        }
    }

    pub fn has_library(&self) -> bool {
        self.library.is_some()
    }

    pub fn is_local_loaded(&self) -> bool {
        self.local.initialized()
    }

    pub fn list_engines(&self) -> Vec<EngineInfo> {
        EngineKind::all()
            .into_iter()
            .map(|kind| match kind {
                EngineKind::Library => EngineInfo {
                    name: kind.wire_name().to_string(),
                    description: "text detection and recognition (PaddleOCR)".to_string(),
                    available: self.has_library(),
                    loaded: self.has_library(),
                },
                EngineKind::Local => EngineInfo {
                    name: kind.wire_name().to_string(),
                    description: "locally trained single-crop recognizer".to_string(),
                    available: true,
                    loaded: self.is_local_loaded(),
                },
            })
            .collect()
    }
}
