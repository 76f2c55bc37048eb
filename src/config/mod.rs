// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration from command-line flags and environment variables

use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::vision::ocr::{EngineKind, DEFAULT_Y_THRESHOLD};

/// Largest accepted request body (16 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// OCR web service
#[derive(Parser, Debug, Clone)]
#[command(name = "ocr-service")]
#[command(version)]
#[command(about = "HTTP service for extracting text from uploaded images", long_about = None)]
pub struct ServiceConfig {
    /// Interface to bind
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "OCR_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding uploads while they are processed
    #[arg(long, env = "OCR_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "OCR_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Engine used when a request names none (easyocr, local)
    #[arg(long, env = "OCR_DEFAULT_ENGINE", default_value = "easyocr")]
    pub default_engine: EngineKind,

    /// Directory with det.onnx, rec.onnx and dict.txt
    #[arg(long, env = "OCR_LIBRARY_MODEL_DIR", default_value = "./models/paddleocr-onnx")]
    pub library_model_dir: PathBuf,

    /// Directory with model_config.toml and the weights it names
    #[arg(long, env = "OCR_LOCAL_MODEL_DIR", default_value = "./models")]
    pub local_model_dir: PathBuf,

    /// Vertical tolerance used when grouping detections into lines
    #[arg(
        long,
        env = "OCR_LINE_THRESHOLD",
        default_value_t = DEFAULT_Y_THRESHOLD,
        value_parser = parse_line_threshold
    )]
    pub line_threshold: f64,

    /// Do not load the library engine at startup
    #[arg(long, env = "OCR_DISABLE_LIBRARY", action = ArgAction::SetTrue)]
    pub disable_library: bool,
}

/// Line thresholds must be finite and non-negative
fn parse_line_threshold(value: &str) -> Result<f64, String> {
    let threshold: f64 = value
        .parse()
        .map_err(|e| format!("invalid line threshold '{}': {}", value, e))?;
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(format!(
            "line threshold must be a finite, non-negative number, got '{}'",
            value
        ));
    }
    Ok(threshold)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            default_engine: EngineKind::Library,
            library_model_dir: PathBuf::from("./models/paddleocr-onnx"),
            local_model_dir: PathBuf::from("./models"),
            line_threshold: DEFAULT_Y_THRESHOLD,
            disable_library: false,
        }
    }
}

impl ServiceConfig {
    pub fn bind_address(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", addr, e))
    }
}
