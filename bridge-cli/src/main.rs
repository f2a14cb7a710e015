// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use uni_bridge::config::BridgeNodeConfig;
use uni_bridge_cli::{Args, BridgeCommand};
use uni_bridge_config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    match args.command {
        BridgeCommand::GenerateConfig { path } => {
            BridgeNodeConfig::example().save(&path)?;
            tracing::debug!("Sample bridge config written to {}", path.display());
            println!("Wrote sample config to {}", path.display());
        }
        BridgeCommand::ValidateConfig { path } => {
            let config = BridgeNodeConfig::load(&path)?;
            config.sanity_check()?;
            println!(
                "Config OK: {} chains, {} reserve seeds, breaker threshold {}",
                config.chains.len(),
                config.reserves.len(),
                config.circuit_breaker.failure_threshold
            );
        }
        BridgeCommand::ShowConfig { path } => {
            let config = BridgeNodeConfig::load(&path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
