// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use ocr_service::{
    api::{start_server, AppState},
    config::ServiceConfig,
    vision::EngineRegistry,
};
use std::{env, sync::Arc};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = ServiceConfig::parse();
    info!(
        "Starting {} v{} (default engine: {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.default_engine
    );

    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!("Failed to create upload directory {}", config.upload_dir.display())
    })?;

    let engines = EngineRegistry::from_config(&config)
        .await
        .context("Failed to initialize OCR engines")?;
    info!("Engines: {:?}", engines);

    let state = Arc::new(AppState::new(engines, config));
    start_server(state).await
}
