// Copyright (c) UniBridge, Inc.
// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(rename_all = "kebab-case")]
#[clap(name = "uni-bridge-cli", about = "Operator tooling for the bridge node")]
pub struct Args {
    #[clap(subcommand)]
    pub command: BridgeCommand,
}

#[derive(Subcommand)]
pub enum BridgeCommand {
    /// Write a ready-to-edit sample node configuration
    GenerateConfig {
        #[clap(long)]
        path: PathBuf,
    },
    /// Parse a node configuration and run its sanity checks
    ValidateConfig {
        #[clap(long)]
        path: PathBuf,
    },
    /// Print the parsed configuration as JSON
    ShowConfig {
        #[clap(long)]
        path: PathBuf,
    },
}
