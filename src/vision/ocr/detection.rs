// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text detection model
//!
//! Runs the DB detector over a letterboxed image and turns the resulting
//! probability map into axis-aligned text boxes.

use anyhow::{Context, Result};
use ndarray::{Array4, ArrayView2};
use ort::value::Value;
use std::path::Path;
use tracing::{debug, info};

use super::session::{output_matrix, SharedSession};

/// Probability above which a map pixel counts as text
pub const DEFAULT_BINARY_THRESHOLD: f32 = 0.3;

/// Connected regions smaller than this many map pixels are discarded
pub const MIN_REGION_PIXELS: usize = 10;

/// DB "unclip" ratio used to grow shrunk text kernels back to full size
pub const UNCLIP_RATIO: f32 = 1.5;

/// A detected text box in detector input coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Mean probability over the region's pixels
    pub confidence: f32,
}

impl TextBox {
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.confidence > 0.0
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Corners clockwise from top-left
    pub fn corners(&self) -> [[f32; 2]; 4] {
        let (x0, y0) = (self.x, self.y);
        let (x1, y1) = (self.x + self.width, self.y + self.height);
        [[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
    }

    /// Grow the box outward by `area * ratio / perimeter` on every side
    pub fn unclip(&self, ratio: f32) -> TextBox {
        let perimeter = 2.0 * (self.width + self.height);
        if perimeter <= 0.0 {
            return self.clone();
        }
        let distance = self.area() * ratio / perimeter;
        TextBox {
            x: self.x - distance,
            y: self.y - distance,
            width: self.width + 2.0 * distance,
            height: self.height + 2.0 * distance,
            confidence: self.confidence,
        }
    }
}

/// Extract text boxes from a `[H, W]` probability map
///
/// Regions are 4-connected components of pixels `>= threshold`; box
/// coordinates are scaled by `(scale_x, scale_y)` into detector input space
/// and returned top-to-bottom, left-to-right.
pub fn boxes_from_probability_map(
    map: ArrayView2<f32>,
    threshold: f32,
    scale_x: f32,
    scale_y: f32,
) -> Vec<TextBox> {
    let (height, width) = map.dim();
    let mut visited = vec![false; height * width];
    let mut boxes = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if visited[y * width + x] || map[[y, x]] < threshold {
                continue;
            }

            let mut stack = vec![(x, y)];
            let (mut min_x, mut max_x, mut min_y, mut max_y) = (x, x, y, y);
            let mut count = 0usize;
            let mut sum = 0.0f32;

            while let Some((cx, cy)) = stack.pop() {
                let idx = cy * width + cx;
                if visited[idx] || map[[cy, cx]] < threshold {
                    continue;
                }
                visited[idx] = true;
                count += 1;
                sum += map[[cy, cx]];
                min_x = min_x.min(cx);
                max_x = max_x.max(cx);
                min_y = min_y.min(cy);
                max_y = max_y.max(cy);

                if cx > 0 {
                    stack.push((cx - 1, cy));
                }
                if cx + 1 < width {
                    stack.push((cx + 1, cy));
                }
                if cy > 0 {
                    stack.push((cx, cy - 1));
                }
                if cy + 1 < height {
                    stack.push((cx, cy + 1));
                }
            }

            if count >= MIN_REGION_PIXELS {
                boxes.push(TextBox {
                    x: min_x as f32 * scale_x,
                    y: min_y as f32 * scale_y,
                    width: (max_x - min_x + 1) as f32 * scale_x,
                    height: (max_y - min_y + 1) as f32 * scale_y,
                    confidence: sum / count as f32,
                });
            }
        }
    }

    boxes.sort_by(|a, b| a.y.total_cmp(&b.y).then_with(|| a.x.total_cmp(&b.x)));
    boxes
}

/// PaddleOCR text detection model (CPU only)
#[derive(Clone, Debug)]
pub struct OcrDetectionModel {
    session: SharedSession,
}

impl OcrDetectionModel {
    /// Load the detector from an ONNX file (`det.onnx`)
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            anyhow::bail!("OCR detection model not found: {}", model_path.display());
        }

        info!("Loading OCR detection model from {}", model_path.display());

        let session = SharedSession::load(model_path, None)
            .context("Failed to load OCR detection model")?;

        Ok(Self { session })
    }

    /// Detect text boxes in a `[1, 3, H, W]` tensor
    pub fn detect(&self, input: &Array4<f32>) -> Result<Vec<TextBox>> {
        let shape = input.shape().to_vec();
        if shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        let mut session = self.session.lock()?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;
        let outputs = session
            .run(ort::inputs![self.session.input_name() => input_value])
            .context("Detection inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;
        debug!("Detection output shape: {:?}", output.shape());

        // [1, 1, H, W] or [1, H, W] -> [H, W]
        let map = output_matrix(output.view(), "detection")?;
        let (map_h, map_w) = map.dim();
        if map_h == 0 {
            anyhow::bail!("Detection output has no rows: {:?}", output.shape());
        }
        let scale_y = shape[2] as f32 / map_h as f32;
        let scale_x = shape[3] as f32 / map_w as f32;

        let boxes: Vec<TextBox> = boxes_from_probability_map(map, DEFAULT_BINARY_THRESHOLD, scale_x, scale_y)
            .into_iter()
            .map(|b| b.unclip(UNCLIP_RATIO))
            .filter(TextBox::is_valid)
            .collect();

        debug!("Detected {} text regions", boxes.len());
        Ok(boxes)
    }
}
