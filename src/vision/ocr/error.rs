// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy shared by the OCR engines and the HTTP layer

use thiserror::Error;

/// Errors produced while validating, loading engines or running OCR
#[derive(Debug, Error)]
pub enum OcrError {
    /// Bad upload or form field (missing file, empty filename, bad extension)
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid model configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Weight files missing or the ONNX session could not be created
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Failure while decoding, preprocessing or running the forward pass
    #[error("Error processing image: {0}")]
    Inference(String),

    /// Anything unexpected (temp file IO, task join failures)
    #[error("Unexpected error: {0}")]
    Internal(String),
}

impl OcrError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wrap an `anyhow` chain as an inference failure, keeping the context
    pub fn inference(err: anyhow::Error) -> Self {
        Self::Inference(format!("{:#}", err))
    }

    pub fn model_load(err: anyhow::Error) -> Self {
        Self::ModelLoad(format!("{:#}", err))
    }

    /// Whether the failure was caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
