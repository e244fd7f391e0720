// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command line definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gremlite")]
#[command(about = "Explain and run Gremlin traversals given as JSON bytecode")]
#[command(version)]
pub struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<log::Level>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show how each strategy rewrites a traversal
    Explain {
        /// Bytecode JSON file
        file: PathBuf,

        /// Maximum line width; defaults to the configured width
        #[arg(short, long)]
        width: Option<usize>,

        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run a traversal against the modern sample graph
    Run {
        /// Bytecode JSON file
        file: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Start from an empty graph instead
        #[arg(long)]
        empty: bool,
    },

    /// List the configured strategies in application order
    Strategies {
        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
