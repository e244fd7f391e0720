// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for Gremlite
//!
//! Reads traversals as JSON bytecode, explains how the configured strategies
//! rewrite them, and runs them against an in-memory graph.

pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{Cli, Commands};
pub use handlers::{handle_explain, handle_run, handle_strategies};
