// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod downloading;

pub use downloading::{paddleocr_files, DownloadReport, DownloadStatus, ModelDownloader, ModelFile};
