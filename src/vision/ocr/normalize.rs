// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Canonicalization of engine output into `Detection` records
//!
//! Engines hand back text with confidences on different scales and geometry
//! wrapped in their own numeric containers (ndarray tensors, tuples, fixed
//! width integers). Everything is funnelled through [`canonicalize`] so that
//! only plain JSON numbers and arrays leave this module.

use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayViewD, Axis};
use serde::Serialize;
use serde_json::{Number, Value};
use tracing::debug;

use super::backend::{EngineKind, RawConfidence, RawDetection};
use super::error::OcrError;

/// Engine-native value as produced by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Multi-dimensional tensor, e.g. a 4x2 polygon from the detector
    Tensor(ArrayD<f32>),
    Sequence(Vec<RawValue>),
    Tuple(Vec<RawValue>),
    Mapping(BTreeMap<String, RawValue>),
}

impl From<[[f32; 2]; 4]> for RawValue {
    fn from(points: [[f32; 2]; 4]) -> Self {
        RawValue::Sequence(
            points
                .iter()
                .map(|[x, y]| RawValue::Tuple(vec![RawValue::Float(*x as f64), RawValue::Float(*y as f64)]))
                .collect(),
        )
    }
}

/// Recursively convert a backend value into plain JSON
pub fn canonicalize(value: &RawValue) -> Value {
    match value {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Int(i) => Value::Number((*i).into()),
        RawValue::UInt(u) => Value::Number((*u).into()),
        RawValue::Float(f) => float_value(*f),
        RawValue::Text(s) => Value::String(s.clone()),
        RawValue::Tensor(tensor) => tensor_value(tensor.view()),
        RawValue::Sequence(items) | RawValue::Tuple(items) => {
            Value::Array(items.iter().map(canonicalize).collect())
        }
        RawValue::Mapping(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), canonicalize(value)))
                .collect(),
        ),
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn tensor_value(view: ArrayViewD<'_, f32>) -> Value {
    if view.ndim() == 0 {
        return view
            .first()
            .map(|v| float_value(*v as f64))
            .unwrap_or(Value::Null);
    }
    Value::Array(view.axis_iter(Axis(0)).map(tensor_value).collect())
}

/// Convert an engine confidence to the canonical 0.0-1.0 scale
pub fn normalize_confidence(confidence: RawConfidence) -> f64 {
    let value = match confidence {
        RawConfidence::Unit(c) => c,
        RawConfidence::Percent(c) => c / 100.0,
        RawConfidence::Fixed => 1.0,
    };
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Quadrilateral of four (x, y) corner points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BoundingBox(pub [[f64; 2]; 4]);

impl BoundingBox {
    pub fn points(&self) -> &[[f64; 2]; 4] {
        &self.0
    }

    pub fn x_left(&self) -> f64 {
        self.0.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min)
    }

    pub fn y_center(&self) -> f64 {
        let (min, max) = self
            .0
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
                (min.min(p[1]), max.max(p[1]))
            });
        (min + max) / 2.0
    }
}

impl TryFrom<&Value> for BoundingBox {
    type Error = OcrError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let malformed = || OcrError::Inference(format!("malformed bounding box: {}", value));

        let corners = value.as_array().ok_or_else(malformed)?;
        if corners.len() != 4 {
            return Err(malformed());
        }

        let mut points = [[0.0f64; 2]; 4];
        for (point, corner) in points.iter_mut().zip(corners) {
            let pair = corner.as_array().ok_or_else(malformed)?;
            if pair.len() != 2 {
                return Err(malformed());
            }
            for (slot, coord) in point.iter_mut().zip(pair) {
                *slot = coord.as_f64().ok_or_else(malformed)?;
            }
        }

        Ok(BoundingBox(points))
    }
}

/// Spatial anchor used for line grouping: left edge and vertical center
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One recognized text fragment in canonical form
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub text: String,
    /// Always within 0.0-1.0
    pub confidence: f64,
    pub bounding_box: Option<BoundingBox>,
}

impl Detection {
    pub fn position(&self) -> Option<Position> {
        self.bounding_box.as_ref().map(|b| Position {
            x: b.x_left(),
            y: b.y_center(),
        })
    }
}

/// Normalize one raw detection from the given engine
pub fn normalize(engine: EngineKind, raw: RawDetection) -> Result<Detection, OcrError> {
    let bounding_box = match raw.bounding_box.as_ref() {
        None => None,
        Some(value) => Some(BoundingBox::try_from(&canonicalize(value))?),
    };

    let confidence = normalize_confidence(raw.confidence);
    debug!(
        "normalized {} detection '{}' (confidence {:.3}, bbox: {})",
        engine,
        raw.text,
        confidence,
        bounding_box.is_some()
    );

    Ok(Detection {
        text: raw.text,
        confidence,
        bounding_box,
    })
}

/// Normalize a full engine result, failing on the first malformed record
pub fn normalize_all(engine: EngineKind, raw: Vec<RawDetection>) -> Result<Vec<Detection>, OcrError> {
    raw.into_iter().map(|r| normalize(engine, r)).collect()
}
