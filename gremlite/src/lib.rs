// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Gremlite - A lightweight Gremlin traversal engine
//!
//! Gremlite compiles Gremlin traversals into step pipelines, rewrites them
//! with an ordered set of traversal strategies and evaluates them lazily
//! over a pluggable graph backend.
//!
//! # Features
//!
//! - **Strategy Engine**: Category-ordered, dependency-sorted rewrite rules
//! - **Lazy Execution**: Pull-based traversers carrying bulk, path and sack
//! - **Predicates**: Composable `P` algebra with and/or/negation
//! - **Mutation Events**: Listener fan-out with transactional batching
//! - **Explanations**: Strategy-by-strategy rewrite traces
//! - **Bytecode**: Serde-serialisable instruction form of any traversal
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use gremlite::{GraphTraversalSource, MemoryGraph, P};
//!
//! let g = GraphTraversalSource::new(Arc::new(MemoryGraph::modern()));
//! let names = g.v(()).has("age", P::gt(30)).values("name").to_list()?;
//! ```

pub mod config;
pub mod error;
pub mod process;
pub mod structure;

pub use config::EngineConfig;
pub use error::{GraphError, GraphResult, TraversalError, TraversalResult};
pub use process::{
    Bytecode, GraphTraversalSource, Traversal, TraversalExplanation, TraversalStrategies,
    TraversalStrategy, P, __,
};
pub use structure::{Direction, Graph, MemoryGraph, Value, T};

/// Gremlite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Gremlite crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
