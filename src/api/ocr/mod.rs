// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR API endpoint module
//!
//! Provides POST /ocr and POST /api/ocr for extracting text from uploads.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{ocr_handler, process_upload};
pub use request::{Layout, OcrRequest};
pub use response::{LineItem, OcrResponse, TextRegion};
