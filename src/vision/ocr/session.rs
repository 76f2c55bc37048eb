// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session setup shared by every engine

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const INTRA_THREADS: usize = 4;

/// Used when a model does not declare its inputs
const FALLBACK_INPUT_NAME: &str = "x";

/// CPU session behind a mutex, plus the name of its image input
///
/// Cloning shares the underlying session; concurrent callers serialize on it.
#[derive(Clone)]
pub struct SharedSession {
    session: Arc<Mutex<Session>>,
    input_name: String,
}

impl std::fmt::Debug for SharedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSession")
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl SharedSession {
    /// Load `model_path`; the image input is the first input not named `auxiliary_input`
    pub fn load(model_path: &Path, auxiliary_input: Option<&str>) -> Result<Self> {
        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(INTRA_THREADS)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        let input_name = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .find(|name| Some(name.as_str()) != auxiliary_input)
            .unwrap_or_else(|| FALLBACK_INPUT_NAME.to_string());
        debug!("{} loaded - input: {}", model_path.display(), input_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|_| anyhow!("ONNX session lock poisoned"))
    }
}

/// Drop the leading batch axes of a model output, keeping the first item
///
/// Fails instead of panicking when a dropped axis is empty, and rejects a
/// result with no columns (classes or map width).
pub fn output_matrix<'a>(output: ArrayViewD<'a, f32>, what: &str) -> Result<ArrayView2<'a, f32>> {
    let shape = output.shape().to_vec();
    let mut view = output;
    while view.ndim() > 2 {
        if view.len_of(Axis(0)) == 0 {
            bail!("{} output has an empty batch axis: {:?}", what, shape);
        }
        view = view.index_axis_move(Axis(0), 0);
    }
    let matrix = view
        .into_dimensionality::<Ix2>()
        .map_err(|_| anyhow!("Unexpected {} output shape: {:?}", what, shape))?;
    if matrix.ncols() == 0 {
        bail!("{} output has no columns: {:?}", what, shape);
    }
    Ok(matrix)
}
