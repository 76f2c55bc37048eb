// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Uniform contract implemented by every recognition engine

use std::fmt;
use std::str::FromStr;

use image::DynamicImage;

use super::error::OcrError;
use super::normalize::RawValue;

/// Which recognition engine serves a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Joint text detection + recognition pipeline (PaddleOCR ONNX)
    Library,
    /// Single-crop recognizer loaded from the local model directory
    Local,
}

impl EngineKind {
    /// Name used in the `engine` form field and echoed in responses
    pub fn wire_name(&self) -> &'static str {
        match self {
            EngineKind::Library => "easyocr",
            EngineKind::Local => "local",
        }
    }

    pub fn all() -> [EngineKind; 2] {
        [EngineKind::Library, EngineKind::Local]
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for EngineKind {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easyocr" | "library" | "library-ocr" => Ok(EngineKind::Library),
            "local" | "local-model" => Ok(EngineKind::Local),
            other => Err(OcrError::validation(format!(
                "Invalid engine '{}', supported: easyocr, local",
                other
            ))),
        }
    }
}

/// Confidence exactly as the engine reports it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawConfidence {
    /// Already on the 0.0-1.0 scale
    Unit(f64),
    /// Reported as a percentage (0-100)
    Percent(f64),
    /// Engine exposes no score; treated as fully confident
    Fixed,
}

/// One engine-native detection before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub text: String,
    pub confidence: RawConfidence,
    /// Four (x, y) corner points in whatever container the engine uses
    pub bounding_box: Option<RawValue>,
}

impl RawDetection {
    pub fn new(text: impl Into<String>, confidence: RawConfidence) -> Self {
        Self {
            text: text.into(),
            confidence,
            bounding_box: None,
        }
    }

    pub fn with_bounding_box(mut self, bounding_box: RawValue) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}

/// A recognition engine: image in, raw detections out
///
/// Implementations are shared process-wide behind an `Arc` and called from
/// blocking worker threads, so `recognize` must be reentrant.
#[cfg_attr(test, mockall::automock)]
pub trait Recognizer: Send + Sync {
    fn engine(&self) -> EngineKind;

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, OcrError>;
}
