// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::multipart::MultipartRejection;
use axum_extra::extract::Multipart;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::request::OcrRequest;
use super::response::OcrResponse;
use crate::api::http_server::AppState;
use crate::api::upload::{read_upload_form, TempUpload, UploadForm};
use crate::vision::load_image_file;
use crate::vision::ocr::{normalize_all, OcrError};

/// POST /ocr and POST /api/ocr - Extract text from an uploaded image
///
/// # Request (multipart/form-data)
/// - `file` or `image`: the image (png, jpg, jpeg, gif, bmp)
/// - `engine`: `easyocr` or `local`, defaults to the configured engine
/// - `layout`: `flat` (default) or `lines`
///
/// # Errors
/// - 400 Bad Request: missing or non-multipart body, missing file, empty
///   filename, bad extension, bad field
/// - 500 Internal Server Error: engine unavailable, model load or OCR failure
pub async fn ocr_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OcrResponse>, OcrError> {
    let multipart = multipart.map_err(|rejection| {
        debug!("Rejected upload body: {}", rejection);
        OcrError::validation("No file part")
    })?;
    let form = read_upload_form(multipart).await?;
    process_upload(&state, form).await.map(Json)
}

/// Validate, stage and recognize one upload
pub async fn process_upload(state: &AppState, form: UploadForm) -> Result<OcrResponse, OcrError> {
    let start = Instant::now();
    let request_id = Uuid::new_v4();
    let request = OcrRequest::from_form(form, state.config.default_engine)?;
    info!(
        "[{}] OCR request: file '{}' ({} bytes), engine {}, layout {}",
        request_id,
        request.filename,
        request.bytes.len(),
        request.engine,
        request.layout
    );

    let upload = TempUpload::create(&state.config.upload_dir, &request.filename, &request.bytes)?;
    let recognizer = state.engines.recognizer(request.engine).await?;

    let path = upload.path().to_path_buf();
    let raw = tokio::task::spawn_blocking(move || {
        let (image, info) = load_image_file(&path)?;
        debug!(
            "Decoded image: {}x{} {:?}, {} bytes",
            info.width, info.height, info.format, info.size_bytes
        );
        recognizer.recognize(&image)
    })
    .await
    .map_err(|e| OcrError::Internal(format!("recognition task failed: {}", e)))??;

    let detections = normalize_all(request.engine, raw)?;
    drop(upload);

    let response = OcrResponse::build(
        request.engine,
        request.layout,
        detections,
        state.config.line_threshold,
    );
    info!(
        "[{}] OCR complete: {} detections via {} in {:?}",
        request_id,
        response.detection_count(),
        request.engine,
        start.elapsed()
    );
    Ok(response)
}
