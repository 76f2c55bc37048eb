// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart form parsing and temporary storage of uploads

use axum::body::Bytes;
use axum_extra::extract::Multipart;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::vision::image_utils::file_extension;
use crate::vision::ocr::OcrError;

/// Form field names that may carry the image
pub const FILE_FIELDS: [&str; 2] = ["file", "image"];

#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename exactly as sent by the client, possibly empty
    pub filename: String,
    pub bytes: Bytes,
}

/// Fields of an OCR upload form before validation
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub engine: Option<String>,
    pub layout: Option<String>,
}

fn malformed(err: impl std::fmt::Display) -> OcrError {
    OcrError::validation(format!("Malformed multipart body: {}", err))
}

/// Read every field of the form; the first file field present wins
pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, OcrError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            n if FILE_FIELDS.contains(&n) => {
                if form.file.is_some() {
                    debug!("Ignoring extra file field '{}'", n);
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                debug!("Received file '{}' ({} bytes) in field '{}'", filename, bytes.len(), n);
                form.file = Some(UploadedFile { filename, bytes });
            }
            "engine" => form.engine = Some(field.text().await.map_err(malformed)?),
            "layout" => form.layout = Some(field.text().await.map_err(malformed)?),
            other => debug!("Ignoring form field '{}'", other),
        }
    }

    Ok(form)
}

/// An upload written to the upload directory, deleted when dropped
#[derive(Debug)]
pub struct TempUpload {
    file: NamedTempFile,
}

impl TempUpload {
    /// Write `bytes` to a uniquely named file in `upload_dir`
    ///
    /// The file keeps the extension of `filename` so that it stays
    /// recognizable while it exists.
    pub fn create(upload_dir: &Path, filename: &str, bytes: &[u8]) -> Result<Self, OcrError> {
        let io_error = |e: std::io::Error| {
            OcrError::Internal(format!("failed to store upload in {}: {}", upload_dir.display(), e))
        };

        std::fs::create_dir_all(upload_dir).map_err(io_error)?;

        let suffix = file_extension(filename)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(upload_dir)
            .map_err(io_error)?;
        file.write_all(bytes).map_err(io_error)?;
        file.flush().map_err(io_error)?;

        debug!("Saved upload to {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        debug!("Removing temporary upload {}", self.file.path().display());
        if let Err(e) = std::fs::remove_file(self.file.path()) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.file.path().display(), e);
            }
        }
    }
}
