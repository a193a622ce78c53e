// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod verify;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ServiceConfig;

/// Entry Shield operator CLI
#[derive(Parser, Debug)]
#[command(name = "entry-shield-cli")]
#[command(version)]
#[command(about = "Operator tools for the Entry Shield gate service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read the plate in an image file and compare it with a declared plate
    Verify(verify::VerifyArgs),

    /// Validate and print the resolved configuration
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// TOML configuration file
    #[arg(long, env = "ENTRY_SHIELD_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Verify(args) => verify::run_verify(args).await,
        Commands::CheckConfig(args) => check_config(args),
    }
}

fn check_config(args: CheckConfigArgs) -> Result<()> {
    let config = ServiceConfig::load(args.config.as_deref())?;
    println!("{}", config.to_toml()?);
    println!("✅ Configuration is valid");
    Ok(())
}
