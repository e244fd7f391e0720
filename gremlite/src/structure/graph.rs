// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Graph capability consumed by the traversal engine
//!
//! The engine never touches storage directly. Start steps, navigation steps,
//! property lookups and mutating steps all go through [`Graph`], so any backend
//! that implements it can be traversed.

use std::fmt;
use std::sync::Arc;

use super::element::{Direction, Edge, Element, ElementId, Vertex};
use super::value::Value;
use crate::error::{GraphResult, TraversalResult};

/// Capabilities a backend advertises
///
/// Compared field by field by the parts of the engine that depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphFeatures {
    pub supports_transactions: bool,
    pub supports_user_supplied_ids: bool,
}

/// Transaction lifecycle notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Open,
    Commit,
    Rollback,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Open => write!(f, "OPEN"),
            TransactionStatus::Commit => write!(f, "COMMIT"),
            TransactionStatus::Rollback => write!(f, "ROLLBACK"),
        }
    }
}

/// Callback invoked on the committing thread when a transaction closes
pub type TransactionListener = Arc<dyn Fn(TransactionStatus) -> TraversalResult<()> + Send + Sync>;

/// Thread-bound transaction control
pub trait Transaction: Send + Sync {
    /// Whether the calling thread has an open transaction
    fn is_open(&self) -> bool;

    /// Open a transaction for the calling thread
    fn open(&self) -> TraversalResult<()>;

    /// Commit the calling thread's transaction and notify listeners
    fn commit(&self) -> TraversalResult<()>;

    /// Roll back the calling thread's transaction and notify listeners
    fn rollback(&self) -> TraversalResult<()>;

    /// Register a listener; listeners are notified in registration order
    fn add_transaction_listener(&self, listener: TransactionListener);
}

/// Graph backend
pub trait Graph: Send + Sync + fmt::Debug {
    /// All vertices, or those with the given ids
    fn vertices(&self, ids: &[ElementId]) -> GraphResult<Vec<Vertex>>;

    /// All edges, or those with the given ids
    fn edges(&self, ids: &[ElementId]) -> GraphResult<Vec<Edge>>;

    fn add_vertex(
        &self,
        label: &str,
        id: Option<ElementId>,
        properties: &[(String, Value)],
    ) -> GraphResult<Vertex>;

    fn add_edge(
        &self,
        label: &str,
        out_v: &Vertex,
        in_v: &Vertex,
        id: Option<ElementId>,
        properties: &[(String, Value)],
    ) -> GraphResult<Edge>;

    /// Edges incident to `vertex` in `direction`, restricted to `labels` when non-empty
    fn adjacent_edges(
        &self,
        vertex: &Vertex,
        direction: Direction,
        labels: &[String],
    ) -> GraphResult<Vec<Edge>>;

    fn property(&self, element: &Element, key: &str) -> GraphResult<Option<Value>>;

    /// Properties of an element in key order; all of them when `keys` is empty
    fn properties(&self, element: &Element, keys: &[String]) -> GraphResult<Vec<(String, Value)>>;

    /// Set a property, returning the previous value
    fn set_property(&self, element: &Element, key: &str, value: Value)
        -> GraphResult<Option<Value>>;

    fn features(&self) -> GraphFeatures;

    /// Transaction control, for backends that support it
    fn tx(&self) -> Option<&dyn Transaction> {
        None
    }
}
