// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::errors::panic_response;
use super::ocr::ocr_handler;
use crate::config::ServiceConfig;
use crate::vision::model_manager::EngineRegistry;
use crate::vision::ALLOWED_EXTENSIONS;

/// Shared state handed to every handler
#[derive(Debug)]
pub struct AppState {
    pub engines: EngineRegistry,
    pub config: ServiceConfig,
}

impl AppState {
    pub fn new(engines: EngineRegistry, config: ServiceConfig) -> Self {
        Self { engines, config }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ocr", post(ocr_handler))
        .route("/api/ocr", post(ocr_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.bind_address()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("OCR service listening on http://{}", addr);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("OCR service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "ocr": ["POST /ocr", "POST /api/ocr"],
            "health": "GET /health",
        },
        "default_engine": state.config.default_engine.wire_name(),
        "engines": state.engines.list_engines(),
        "allowed_extensions": ALLOWED_EXTENSIONS,
        "max_upload_bytes": state.config.max_upload_bytes,
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
