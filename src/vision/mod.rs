// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based text extraction
//!
//! This module provides:
//! - OCR engines (PaddleOCR pipeline and a config-driven local model)
//! - Upload filename checks and image decoding
//! - The engine registry shared by request handlers

pub mod image_utils;
pub mod model_manager;
pub mod ocr;

pub use image_utils::{
    allowed_file, decode_image_bytes, detect_format, load_image_file, sanitize_filename, ImageError,
    ImageInfo, ALLOWED_EXTENSIONS,
};
pub use model_manager::{EngineInfo, EngineLoader, EngineRegistry};
