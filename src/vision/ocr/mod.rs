// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR engines, result normalization and line grouping
//!
//! Components:
//! - `backend` - `Recognizer` contract shared by all engines
//! - `pipeline` - PaddleOCR detection + recognition (library engine)
//! - `local_model` - config-driven single-crop recognizer (local engine)
//! - `normalize` - canonical `Detection` records
//! - `layout` - reading-order line grouping

pub mod backend;
pub mod detection;
pub mod error;
pub mod layout;
pub mod local_model;
pub mod normalize;
pub mod pipeline;
pub mod preprocessing;
pub mod recognition;
pub mod session;

pub use backend::{EngineKind, RawConfidence, RawDetection, Recognizer};
pub use detection::{OcrDetectionModel, TextBox};
pub use error::OcrError;
pub use layout::{group_into_lines, Line, DEFAULT_Y_THRESHOLD};
pub use local_model::{LocalModelConfig, LocalModelLoader, LocalRecognizer};
pub use normalize::{normalize, normalize_all, BoundingBox, Detection, Position, RawValue};
pub use pipeline::PaddleOcrPipeline;
pub use recognition::{OcrRecognitionModel, RecognizedText};
pub use session::SharedSession;
