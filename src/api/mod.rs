// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod ocr;
pub mod upload;

pub use errors::ErrorResponse;
pub use http_server::{create_app, start_server, AppState};
pub use ocr::{ocr_handler, Layout, OcrRequest, OcrResponse};
pub use upload::{read_upload_form, TempUpload, UploadForm, UploadedFile};
