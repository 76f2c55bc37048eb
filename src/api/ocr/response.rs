// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR response types

use serde::Serialize;

use super::request::Layout;
use crate::vision::ocr::{group_into_lines, BoundingBox, Detection, EngineKind, Line, Position};

/// One detection in a flat response
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TextRegion {
    pub text: String,
    /// Always within 0.0-1.0
    pub confidence: f64,
    /// Four `[x, y]` corners, or `null` when the engine reports no geometry
    pub bbox: Option<BoundingBox>,
}

impl From<Detection> for TextRegion {
    fn from(d: Detection) -> Self {
        Self {
            text: d.text,
            confidence: d.confidence,
            bbox: d.bounding_box,
        }
    }
}

/// One detection inside a line of a `lines` response
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineItem {
    pub text: String,
    pub confidence: f64,
    /// Left edge and vertical center
    pub position: Option<Position>,
}

impl From<Detection> for LineItem {
    fn from(d: Detection) -> Self {
        let position = d.position();
        Self {
            text: d.text,
            confidence: d.confidence,
            position,
        }
    }
}

/// Successful OCR response
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum OcrResponse {
    Flat {
        success: bool,
        result: Vec<TextRegion>,
        engine: &'static str,
    },
    Lines {
        success: bool,
        lines: Vec<Vec<LineItem>>,
        engine: &'static str,
    },
}

impl OcrResponse {
    pub fn flat(engine: EngineKind, detections: Vec<Detection>) -> Self {
        OcrResponse::Flat {
            success: true,
            result: detections.into_iter().map(TextRegion::from).collect(),
            engine: engine.wire_name(),
        }
    }

    pub fn lines(engine: EngineKind, lines: Vec<Line>) -> Self {
        OcrResponse::Lines {
            success: true,
            lines: lines
                .into_iter()
                .map(|line| line.into_iter().map(LineItem::from).collect())
                .collect(),
            engine: engine.wire_name(),
        }
    }

    /// Build the response for the requested layout
    pub fn build(
        engine: EngineKind,
        layout: Layout,
        detections: Vec<Detection>,
        y_threshold: f64,
    ) -> Self {
        match layout {
            Layout::Flat => Self::flat(engine, detections),
            Layout::Lines => Self::lines(engine, group_into_lines(detections, y_threshold)),
        }
    }

    /// Number of detections carried by the response
    pub fn detection_count(&self) -> usize {
        match self {
            OcrResponse::Flat { result, .. } => result.len(),
            OcrResponse::Lines { lines, .. } => lines.iter().map(Vec::len).sum(),
        }
    }
}
