// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use ocr_service::models::{paddleocr_files, DownloadStatus, ModelDownloader};
use std::path::PathBuf;

/// Download the PaddleOCR ONNX models used by the library engine
#[derive(Parser, Debug)]
#[command(name = "download-models")]
#[command(version)]
#[command(about = "Fetch det.onnx, rec.onnx and dict.txt into the model directory", long_about = None)]
struct Args {
    /// Target directory
    #[arg(long, env = "OCR_LIBRARY_MODEL_DIR", default_value = "./models/paddleocr-onnx")]
    model_dir: PathBuf,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let downloader = ModelDownloader::new(&args.model_dir)?.with_progress(!args.quiet);
    let report = downloader.download_all(&paddleocr_files()).await?;

    for (file, status) in &report.results {
        match status {
            DownloadStatus::Skipped => println!("  {} (already present)", file.filename),
            DownloadStatus::Downloaded { bytes, .. } => {
                println!("  {} ({} bytes)", file.filename, bytes)
            }
            DownloadStatus::Failed(reason) => println!("  {} FAILED: {}", file.filename, reason),
        }
    }

    if !report.is_success() {
        eprintln!(
            "Error: {} of {} files failed to download into {}",
            report.failures(),
            report.results.len(),
            downloader.model_dir().display()
        );
        std::process::exit(1);
    }

    println!("Models ready in {}", downloader.model_dir().display());
    Ok(())
}
