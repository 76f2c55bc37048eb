// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod models;
pub mod vision;

pub use api::{create_app, AppState};
pub use config::ServiceConfig;
pub use vision::ocr::{Detection, EngineKind, OcrError};
pub use vision::EngineRegistry;
