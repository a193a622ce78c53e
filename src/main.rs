// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use entry_shield::{
    api::{serve, AppState},
    config::ServiceConfig,
    storage::open_store,
    version,
    vision::PlateModelManager,
};
use std::{env, path::PathBuf};
use tokio::signal;

/// Entry Shield gate-pass service
#[derive(Parser, Debug)]
#[command(name = "entry-shield", version)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "ENTRY_SHIELD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    println!("🚀 Starting Entry Shield...\n");
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("📅 Build Date: {}", version::BUILD_DATE);
    println!();

    let config = ServiceConfig::load(args.config.as_deref()).context("Invalid configuration")?;

    // Storage
    let store = open_store(config.storage.database_path.as_deref())?;
    println!("✅ Gate-pass store ready ({})", store.name());

    // Plate models are loaded once and shared by every request
    println!("🔍 Loading plate models...");
    let models = PlateModelManager::load(&config.models, &config.verification);
    if models.verifier().is_some() {
        println!("✅ Plate verification enabled");
    } else {
        println!("⚠️  Plate verification disabled, visits will be recorded without detection");
    }

    let state = AppState::new(store, models.verifier()).with_models(models.list_models());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context(format!("Failed to bind {}", config.listen_addr))?;

    println!("\nPress Ctrl+C to shutdown...");

    serve(listener, state, async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        println!("\n🛑 Shutting down...");
    })
    .await
}
