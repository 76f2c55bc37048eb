// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text recognition model
//!
//! Recognizes the text content of a single cropped text region.

use anyhow::{Context, Result};
use ndarray::{Array4, ArrayViewD};
use ort::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::preprocessing::REC_INPUT_HEIGHT;
use super::session::{output_matrix, SharedSession};

/// Recognized text with confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    /// Mean probability of the emitted characters (0.0-1.0)
    pub confidence: f32,
}

impl RecognizedText {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Load a one-character-per-line dictionary, blank token at index 0
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> Result<Vec<char>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open dictionary: {}", path.display()))?;

    let mut dictionary = vec![' '];
    for line in BufReader::new(file).lines() {
        let line = line.context("Failed to read dictionary line")?;
        if let Some(ch) = line.chars().next() {
            dictionary.push(ch);
        }
    }

    // PaddleOCR appends space as the last class
    if !dictionary[1..].contains(&' ') {
        dictionary.push(' ');
    }

    Ok(dictionary)
}

/// Greedy CTC decode of a `[T, C]` (or `[1, T, C]`) probability tensor
///
/// Repeated indices collapse, index 0 is the blank. Indices past the end of
/// `dictionary` are dropped.
pub fn ctc_greedy_decode(output: ArrayViewD<'_, f32>, dictionary: &[char]) -> Result<RecognizedText> {
    let steps = output_matrix(output, "recognition")?;

    let mut text = String::new();
    let mut total = 0.0f32;
    let mut emitted = 0usize;
    let mut prev_index = 0usize;

    for row in steps.outer_iter() {
        let (max_index, max_prob) = row
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, p)| {
                if *p > best.1 {
                    (i, *p)
                } else {
                    best
                }
            });

        if max_index != 0 && max_index != prev_index {
            if let Some(ch) = dictionary.get(max_index) {
                text.push(*ch);
                total += max_prob;
                emitted += 1;
            }
        }
        prev_index = max_index;
    }

    let confidence = if emitted == 0 {
        0.0
    } else {
        (total / emitted as f32).clamp(0.0, 1.0)
    };

    Ok(RecognizedText { text, confidence })
}

/// PaddleOCR text recognition model (CPU only)
#[derive(Clone)]
pub struct OcrRecognitionModel {
    session: SharedSession,
    dictionary: Arc<Vec<char>>,
}

impl std::fmt::Debug for OcrRecognitionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrRecognitionModel")
            .field("session", &self.session)
            .field("dictionary_size", &self.dictionary.len())
            .finish_non_exhaustive()
    }
}

impl OcrRecognitionModel {
    /// Load the recognizer (`rec.onnx`) and its character dictionary (`dict.txt`)
    pub fn new<P: AsRef<Path>>(model_path: P, dict_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let dict_path = dict_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("OCR recognition model not found: {}", model_path.display());
        }
        if !dict_path.exists() {
            anyhow::bail!("OCR character dictionary not found: {}", dict_path.display());
        }

        info!("Loading OCR recognition model from {}", model_path.display());

        let dictionary = load_dictionary(dict_path)?;
        info!("Loaded character dictionary with {} characters", dictionary.len());

        let session = SharedSession::load(model_path, None)
            .context("Failed to load OCR recognition model")?;

        Ok(Self {
            session,
            dictionary: Arc::new(dictionary),
        })
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    /// Recognize text from a `[1, 3, 48, W]` tensor
    pub fn recognize(&self, input: &Array4<f32>) -> Result<RecognizedText> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 || shape[2] != REC_INPUT_HEIGHT as usize || shape[3] < 4 {
            anyhow::bail!(
                "Invalid input shape: {:?}, expected [1, 3, {}, W>=4]",
                shape,
                REC_INPUT_HEIGHT
            );
        }

        let mut session = self.session.lock()?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;
        let outputs = session
            .run(ort::inputs![self.session.input_name() => input_value])
            .context("Recognition inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let classes = output.shape().last().copied().unwrap_or(0);
        if classes != self.dictionary.len() {
            warn!(
                "Recognition output has {} classes, dictionary has {}",
                classes,
                self.dictionary.len()
            );
        }

        ctc_greedy_decode(output.view(), &self.dictionary)
    }
}
