// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local fixed-input recognizer driven by `model_config.toml`
//!
//! The whole image is resized to the configured input size and passed
//! through a sequence classifier; every time step's argmax is mapped onto
//! `character_list`. One text string is produced per image, without
//! geometry.

use async_trait::async_trait;
use image::DynamicImage;
use ndarray::{Array2, ArrayView1, ArrayViewD};
use ort::value::Value;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::backend::{EngineKind, RawConfidence, RawDetection, Recognizer};
use super::error::OcrError;
use super::preprocessing::preprocess_fixed;
use super::session::{output_matrix, SharedSession};
use crate::vision::model_manager::EngineLoader;

pub const MODEL_CONFIG_FILE: &str = "model_config.toml";

const DEFAULT_CHARACTER_LIST: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

fn default_input_channel() -> usize {
    1
}

fn default_character_list() -> String {
    DEFAULT_CHARACTER_LIST.to_string()
}

fn default_mean() -> Vec<f32> {
    vec![0.485]
}

fn default_std() -> Vec<f32> {
    vec![0.229]
}

/// `[model]` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSection {
    /// Weights file, relative to the model directory
    pub weights: String,
    #[serde(default = "default_input_channel")]
    pub input_channel: usize,
    /// `[height, width]`
    pub input_size: [u32; 2],
    pub num_classes: usize,
    /// Name of an auxiliary text input fed a `[1, 1]` zero tensor
    #[serde(default)]
    pub text_input: Option<String>,
}

/// `[preprocess]` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreprocessSection {
    #[serde(default = "default_mean")]
    pub normalize_mean: Vec<f32>,
    #[serde(default = "default_std")]
    pub normalize_std: Vec<f32>,
}

impl Default for PreprocessSection {
    fn default() -> Self {
        Self {
            normalize_mean: default_mean(),
            normalize_std: default_std(),
        }
    }
}

/// `[postprocess]` table
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PostprocessSection {
    /// Collapse consecutive identical characters
    #[serde(default)]
    pub remove_duplicates: bool,
    /// Strip spaces
    #[serde(default)]
    pub remove_blank: bool,
    /// Report the mean per-step probability instead of a fixed 1.0
    #[serde(default)]
    pub report_scores: bool,
}

/// Parsed `model_config.toml`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocalModelConfig {
    pub model: ModelSection,
    #[serde(default)]
    pub preprocess: PreprocessSection,
    #[serde(default)]
    pub postprocess: PostprocessSection,
    #[serde(default = "default_character_list")]
    pub character_list: String,
}

impl LocalModelConfig {
    /// Read `model_config.toml` from `model_dir`
    pub fn load(model_dir: &Path) -> Result<Self, OcrError> {
        let path = model_dir.join(MODEL_CONFIG_FILE);
        if !path.exists() {
            return Err(OcrError::Configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            OcrError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, OcrError> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| OcrError::Configuration(format!("Invalid model config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), OcrError> {
        let invalid = |msg: String| Err(OcrError::Configuration(msg));
        let channels = self.model.input_channel;

        if channels != 1 && channels != 3 {
            return invalid(format!("input_channel must be 1 or 3, got {}", channels));
        }
        if self.model.input_size.contains(&0) {
            return invalid(format!("input_size must be positive, got {:?}", self.model.input_size));
        }
        if self.model.num_classes == 0 {
            return invalid("num_classes must be positive".to_string());
        }
        if self.character_list.is_empty() {
            return invalid("character_list must not be empty".to_string());
        }
        for (name, values) in [
            ("normalize_mean", &self.preprocess.normalize_mean),
            ("normalize_std", &self.preprocess.normalize_std),
        ] {
            if values.len() != 1 && values.len() != channels {
                return invalid(format!(
                    "{} has {} values, expected 1 or {}",
                    name,
                    values.len(),
                    channels
                ));
            }
        }
        if self.preprocess.normalize_std.iter().any(|s| *s == 0.0) {
            return invalid("normalize_std must not contain zero".to_string());
        }
        Ok(())
    }

    pub fn weights_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(&self.model.weights)
    }

    pub fn characters(&self) -> Vec<char> {
        self.character_list.chars().collect()
    }
}

/// Probability of the winning class at one time step
///
/// Rows that already form a distribution are used as is, anything else is
/// treated as logits.
fn step_probability(row: ArrayView1<'_, f32>, max: f32) -> f32 {
    let sum: f32 = row.sum();
    if row.iter().all(|v| (0.0..=1.0).contains(v)) && (sum - 1.0).abs() < 1e-3 {
        return max;
    }
    let denom: f32 = row.iter().map(|v| (v - max).exp()).sum();
    if denom > 0.0 {
        1.0 / denom
    } else {
        0.0
    }
}

/// Decode a `[T, C]` (or `[1, T, C]`) output into `(text, mean step probability)`
pub fn decode_sequence(
    output: ArrayViewD<'_, f32>,
    characters: &[char],
    post: &PostprocessSection,
) -> anyhow::Result<(String, f32)> {
    let steps = output_matrix(output, "local model")?;

    let mut decoded = Vec::with_capacity(steps.nrows());
    let mut score = 0.0f32;

    for row in steps.outer_iter() {
        let (index, max) = row
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, v)| {
                if *v > best.1 {
                    (i, *v)
                } else {
                    best
                }
            });
        score += step_probability(row, max);
        if let Some(ch) = characters.get(index) {
            decoded.push(*ch);
        }
    }

    if post.remove_duplicates {
        decoded.dedup();
    }
    if post.remove_blank {
        decoded.retain(|c| *c != ' ');
    }

    let mean = if steps.nrows() == 0 {
        0.0
    } else {
        (score / steps.nrows() as f32).clamp(0.0, 1.0)
    };
    Ok((decoded.into_iter().collect(), mean))
}

/// Recognizer over a locally trained ONNX model
#[derive(Clone)]
pub struct LocalRecognizer {
    session: SharedSession,
    config: LocalModelConfig,
    characters: Arc<Vec<char>>,
}

impl std::fmt::Debug for LocalRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRecognizer")
            .field("session", &self.session)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LocalRecognizer {
    /// Read the config in `model_dir` and load the weights it names
    pub fn load(model_dir: &Path) -> Result<Self, OcrError> {
        let config = LocalModelConfig::load(model_dir)?;
        Self::new(model_dir, config)
    }

    pub fn new(model_dir: &Path, config: LocalModelConfig) -> Result<Self, OcrError> {
        let weights = config.weights_path(model_dir);
        if !weights.exists() {
            return Err(OcrError::ModelLoad(format!(
                "Weights file not found: {}",
                weights.display()
            )));
        }

        info!("Loading local model from {}", weights.display());
        let start = Instant::now();

        let session = SharedSession::load(&weights, config.model.text_input.as_deref())
            .map_err(OcrError::model_load)?;

        info!(
            "Local model loaded in {:?} (input: {})",
            start.elapsed(),
            session.input_name()
        );

        let characters = Arc::new(config.characters());
        Ok(Self {
            session,
            config,
            characters,
        })
    }

    pub fn config(&self) -> &LocalModelConfig {
        &self.config
    }

    fn run(&self, image: &DynamicImage) -> anyhow::Result<(String, f32)> {
        let [height, width] = self.config.model.input_size;
        let tensor = preprocess_fixed(
            image,
            self.config.model.input_channel,
            height,
            width,
            &self.config.preprocess.normalize_mean,
            &self.config.preprocess.normalize_std,
        )?;

        let mut session = self.session.lock()?;

        let image_value = Value::from_array(tensor)?;
        let outputs = match &self.config.model.text_input {
            Some(text_name) => {
                let text_value = Value::from_array(Array2::<i64>::zeros((1, 1)))?;
                session.run(ort::inputs![
                    self.session.input_name() => image_value,
                    text_name.as_str() => text_value
                ])?
            }
            None => session.run(ort::inputs![self.session.input_name() => image_value])?,
        };

        let output = outputs[0].try_extract_array::<f32>()?;
        debug!("Local model output shape: {:?}", output.shape());

        let classes = output.shape().last().copied().unwrap_or(0);
        if classes != self.config.model.num_classes {
            warn!(
                "Local model produced {} classes, config declares {}",
                classes, self.config.model.num_classes
            );
        }

        decode_sequence(output.view(), &self.characters, &self.config.postprocess)
    }
}

impl Recognizer for LocalRecognizer {
    fn engine(&self) -> EngineKind {
        EngineKind::Local
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, OcrError> {
        let (text, score) = self.run(image).map_err(OcrError::inference)?;
        let confidence = if self.config.postprocess.report_scores {
            RawConfidence::Unit(score as f64)
        } else {
            RawConfidence::Fixed
        };
        Ok(vec![RawDetection::new(text, confidence)])
    }
}

/// Loads the local recognizer from a model directory on first use
#[derive(Debug, Clone)]
pub struct LocalModelLoader {
    model_dir: PathBuf,
}

impl LocalModelLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }
}

#[async_trait]
impl EngineLoader for LocalModelLoader {
    async fn load(&self) -> Result<Arc<dyn Recognizer>, OcrError> {
        let model_dir = self.model_dir.clone();
        let recognizer = tokio::task::spawn_blocking(move || LocalRecognizer::load(&model_dir))
            .await
            .map_err(|e| OcrError::Internal(format!("local model loader failed: {}", e)))??;
        Ok(Arc::new(recognizer))
    }
}
