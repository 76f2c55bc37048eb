// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR request validation

use axum::body::Bytes;
use std::fmt;
use std::str::FromStr;

use crate::api::upload::UploadForm;
use crate::vision::image_utils::{allowed_file, sanitize_filename};
use crate::vision::ocr::{EngineKind, OcrError};

/// Shape of a successful response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// One entry per detection, in engine order
    #[default]
    Flat,
    /// Detections grouped into reading-order lines
    Lines,
}

impl FromStr for Layout {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Ok(Layout::Flat),
            "lines" => Ok(Layout::Lines),
            other => Err(OcrError::validation(format!(
                "Invalid layout '{}', supported: flat, lines",
                other
            ))),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Flat => f.write_str("flat"),
            Layout::Lines => f.write_str("lines"),
        }
    }
}

/// A validated OCR request
#[derive(Debug, Clone)]
pub struct OcrRequest {
    /// Sanitized client filename
    pub filename: String,
    pub bytes: Bytes,
    pub engine: EngineKind,
    pub layout: Layout,
}

fn optional<T: FromStr<Err = OcrError>>(value: Option<&str>) -> Result<Option<T>, OcrError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}

impl OcrRequest {
    /// Validate a parsed form
    ///
    /// Checks run in order: file present, filename non-empty, extension
    /// allowed, then engine and layout.
    pub fn from_form(form: UploadForm, default_engine: EngineKind) -> Result<Self, OcrError> {
        let file = form
            .file
            .ok_or_else(|| OcrError::validation("No file part"))?;

        if file.filename.is_empty() {
            return Err(OcrError::validation("No selected file"));
        }
        if !allowed_file(&file.filename) {
            return Err(OcrError::validation("Invalid file type"));
        }

        let engine = optional::<EngineKind>(form.engine.as_deref())?.unwrap_or(default_engine);
        let layout = optional::<Layout>(form.layout.as_deref())?.unwrap_or_default();

        Ok(Self {
            filename: sanitize_filename(&file.filename),
            bytes: file.bytes,
            engine,
            layout,
        })
    }
}
