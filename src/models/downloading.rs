// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fetches the PaddleOCR ONNX files used by the library engine

use anyhow::{Context, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::vision::ocr::pipeline::{DETECTION_MODEL_FILE, DICTIONARY_FILE, RECOGNITION_MODEL_FILE};

const HF_BASE: &str = "https://huggingface.co/monkt/paddleocr-onnx/resolve/main";

/// One file to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFile {
    pub filename: &'static str,
    pub url: String,
}

/// Files needed by the library engine
pub fn paddleocr_files() -> Vec<ModelFile> {
    vec![
        ModelFile {
            filename: DETECTION_MODEL_FILE,
            url: format!("{}/detection/v3/det.onnx", HF_BASE),
        },
        ModelFile {
            filename: RECOGNITION_MODEL_FILE,
            url: format!("{}/languages/english/rec.onnx", HF_BASE),
        },
        ModelFile {
            filename: DICTIONARY_FILE,
            url: format!("{}/languages/english/dict.txt", HF_BASE),
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Already present, nothing fetched
    Skipped,
    Downloaded { bytes: u64, sha256: String },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub results: Vec<(ModelFile, DownloadStatus)>,
}

impl DownloadReport {
    pub fn failures(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, status)| matches!(status, DownloadStatus::Failed(_)))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

pub struct ModelDownloader {
    client: reqwest::Client,
    model_dir: PathBuf,
    show_progress: bool,
}

impl ModelDownloader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            model_dir: model_dir.into(),
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Fetch every missing file; one failure does not stop the others
    pub async fn download_all(&self, files: &[ModelFile]) -> Result<DownloadReport> {
        std::fs::create_dir_all(&self.model_dir).with_context(|| {
            format!("Failed to create model directory {}", self.model_dir.display())
        })?;

        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let status = self.ensure(file).await;
            results.push((file.clone(), status));
        }
        Ok(DownloadReport { results })
    }

    async fn ensure(&self, file: &ModelFile) -> DownloadStatus {
        let path = self.model_dir.join(file.filename);
        if path.exists() {
            info!("{} already exists, skipping download", file.filename);
            return DownloadStatus::Skipped;
        }

        info!("Downloading {} from {}", file.filename, file.url);
        match self.download_file(&file.url, &path).await {
            Ok((bytes, sha256)) => {
                info!("Downloaded {} ({} bytes, sha256 {})", file.filename, bytes, sha256);
                DownloadStatus::Downloaded { bytes, sha256 }
            }
            Err(e) => {
                error!("Error downloading {}: {:#}", file.filename, e);
                DownloadStatus::Failed(format!("{:#}", e))
            }
        }
    }

    /// Stream `url` into `<path>.part`, then rename into place
    async fn download_file(&self, url: &str, path: &Path) -> Result<(u64, String)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send download request")?;

        if !response.status().is_success() {
            anyhow::bail!("Download failed with status {}: {}", response.status(), url);
        }

        let total_size = response.content_length();
        debug!("Download size: {:?} bytes", total_size);
        let progress = self.progress_bar(total_size);

        let part_path = part_path(path);
        let result = async {
            let mut file = std::fs::File::create(&part_path)
                .with_context(|| format!("Failed to create {}", part_path.display()))?;
            let mut hasher = Sha256::new();
            let mut downloaded = 0u64;
            let mut stream = response.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.context("Error reading download stream")?;
                file.write_all(&chunk).context("Failed to write downloaded data")?;
                hasher.update(&chunk);
                downloaded += chunk.len() as u64;
                progress.set_position(downloaded);
            }
            file.flush().context("Failed to flush downloaded file")?;

            std::fs::rename(&part_path, path)
                .context("Failed to move downloaded file to final location")?;
            Ok::<_, anyhow::Error>((downloaded, format!("{:x}", hasher.finalize())))
        }
        .await;

        progress.finish_and_clear();
        if result.is_err() {
            std::fs::remove_file(&part_path).ok();
        }
        result
    }

    fn progress_bar(&self, total_size: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        match total_size {
            Some(total) => {
                let bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                ) {
                    bar.set_style(style);
                }
                bar
            }
            None => ProgressBar::new_spinner(),
        }
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
