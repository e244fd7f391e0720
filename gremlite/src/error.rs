// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for traversal construction, strategy application and execution

use thiserror::Error;

/// Error types for graph backend operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Vertex not found: {0}")]
    VertexNotFound(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Vertex already exists: {0}")]
    VertexAlreadyExists(String),

    #[error("Edge already exists: {0}")]
    EdgeAlreadyExists(String),

    #[error("Invalid edge: out vertex {out_v} to in vertex {in_v} - one or both vertices don't exist")]
    InvalidEdge { out_v: String, in_v: String },

    #[error("Property error: {0}")]
    PropertyError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

/// Traversal errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraversalError {
    /// Illegal setup: cyclic strategy constraints, missing graph, bad widths
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A verification strategy rejected the traversal
    #[error("Verification failed: {0}")]
    Verification(String),

    /// A traversal-valued parameter produced no result for a traverser
    #[error("Parameter resolution error: {0}")]
    ParameterResolution(String),

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Event error: {0}")]
    Event(String),

    #[error("Bytecode error: {0}")]
    Bytecode(String),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

impl TraversalError {
    /// True when the error came out of a verification strategy
    pub fn is_verification(&self) -> bool {
        matches!(self, TraversalError::Verification(_))
    }
}

/// Result type for graph backend operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type for traversal operations
pub type TraversalResult<T> = Result<T, TraversalError>;
