// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Graph structure: values, elements and the backend capability
//!
//! This module provides:
//! - Value type system for traverser payloads and properties
//! - Vertex/edge references and detached snapshots
//! - The `Graph` and `Transaction` traits consumed by the engine
//! - An in-memory backend with the "modern" sample graph

pub mod element;
pub mod graph;
pub mod memory;
pub mod value;

pub use element::{
    DetachedEdge, DetachedElement, DetachedVertex, Direction, Edge, Element, ElementId, Vertex, T,
};
pub use graph::{Graph, GraphFeatures, Transaction, TransactionListener, TransactionStatus};
pub use memory::MemoryGraph;
pub use value::Value;
