// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::{error, warn};

use crate::vision::ocr::OcrError;

/// Body of every failed request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl OcrError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OcrError::Validation(_) => StatusCode::BAD_REQUEST,
            OcrError::Configuration(_)
            | OcrError::ModelLoad(_)
            | OcrError::Inference(_)
            | OcrError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("OCR request failed: {}", self);
        } else {
            warn!("OCR request rejected: {}", self);
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// Converts a handler panic into the regular 500 error body
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    OcrError::Internal(detail).into_response()
}
