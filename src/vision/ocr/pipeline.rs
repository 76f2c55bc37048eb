// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Joint detection + recognition pipeline backing the library engine

use anyhow::Context;
use image::{DynamicImage, GenericImageView};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use super::backend::{EngineKind, RawConfidence, RawDetection, Recognizer};
use super::detection::{OcrDetectionModel, TextBox};
use super::error::OcrError;
use super::normalize::RawValue;
use super::preprocessing::{
    preprocess_for_detection, preprocess_for_recognition, PreprocessInfo, DET_INPUT_SIZE,
};
use super::recognition::OcrRecognitionModel;

pub const DETECTION_MODEL_FILE: &str = "det.onnx";
pub const RECOGNITION_MODEL_FILE: &str = "rec.onnx";
pub const DICTIONARY_FILE: &str = "dict.txt";

/// Crops narrower or shorter than this (in original pixels) are skipped
const MIN_CROP_SIDE: u32 = 2;

/// PaddleOCR detection and recognition over a whole image
#[derive(Debug, Clone)]
pub struct PaddleOcrPipeline {
    detector: OcrDetectionModel,
    recognizer: OcrRecognitionModel,
    model_dir: PathBuf,
}

impl PaddleOcrPipeline {
    /// Load `det.onnx`, `rec.onnx` and `dict.txt` from `model_dir`
    pub fn load<P: AsRef<Path>>(model_dir: P) -> anyhow::Result<Self> {
        let model_dir = model_dir.as_ref();
        info!("Loading PaddleOCR pipeline from {}", model_dir.display());
        let start = Instant::now();

        let detector = OcrDetectionModel::new(model_dir.join(DETECTION_MODEL_FILE))
            .context("Failed to load text detection model")?;
        let recognizer = OcrRecognitionModel::new(
            model_dir.join(RECOGNITION_MODEL_FILE),
            model_dir.join(DICTIONARY_FILE),
        )
        .context("Failed to load text recognition model")?;

        info!(
            "PaddleOCR pipeline ready in {:?} ({} dictionary entries)",
            start.elapsed(),
            recognizer.dictionary_size()
        );

        Ok(Self {
            detector,
            recognizer,
            model_dir: model_dir.to_path_buf(),
        })
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    fn run(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawDetection>> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        let info = PreprocessInfo::new(image, DET_INPUT_SIZE);
        let tensor = preprocess_for_detection(image);
        let boxes = self.detector.detect(&tensor)?;

        let mut detections = Vec::with_capacity(boxes.len());
        for text_box in &boxes {
            let corners = original_corners(text_box, &info);
            let Some((x, y, w, h)) = crop_rect(&corners, width, height) else {
                debug!("Skipping degenerate region {:?}", text_box);
                continue;
            };

            let crop = image.crop_imm(x, y, w, h);
            let recognized = self.recognizer.recognize(&preprocess_for_recognition(&crop))?;
            if recognized.is_empty() {
                continue;
            }

            let polygon = Array2::from_shape_fn((4, 2), |(i, j)| corners[i][j]).into_dyn();
            detections.push(
                RawDetection::new(recognized.text, RawConfidence::Unit(recognized.confidence as f64))
                    .with_bounding_box(RawValue::Tensor(polygon)),
            );
        }

        info!(
            "Recognized {} of {} regions in {:?}",
            detections.len(),
            boxes.len(),
            start.elapsed()
        );
        Ok(detections)
    }
}

impl Recognizer for PaddleOcrPipeline {
    fn engine(&self) -> EngineKind {
        EngineKind::Library
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, OcrError> {
        self.run(image).map_err(OcrError::inference)
    }
}

/// Map a detector box back into original image coordinates
fn original_corners(text_box: &TextBox, info: &PreprocessInfo) -> [[f32; 2]; 4] {
    text_box.corners().map(|[x, y]| {
        let (ox, oy) = info.map_to_original(x, y);
        [ox, oy]
    })
}

/// Integer crop rectangle `(x, y, w, h)` covering the corners, inside the image
fn crop_rect(corners: &[[f32; 2]; 4], width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let min_x = corners.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let min_y = corners.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let max_x = (corners.iter().map(|p| p[0]).fold(0.0, f32::max).ceil() as u32).min(width);
    let max_y = (corners.iter().map(|p| p[1]).fold(0.0, f32::max).ceil() as u32).min(height);

    if max_x < min_x + MIN_CROP_SIDE || max_y < min_y + MIN_CROP_SIDE {
        return None;
    }
    Some((min_x, min_y, max_x - min_x, max_y - min_y))
}
