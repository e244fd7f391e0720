// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Engine configuration
//!
//! Loaded from JSON. Every field has a default, so a partial document (or
//! `{}`) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{TraversalError, TraversalResult};
use crate::process::explanation::DEFAULT_EXPLAIN_WIDTH;
use crate::process::strategy::element_id::DEFAULT_ID_PROPERTY_KEY;

/// Which built-in strategies a default strategy set contains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyToggles {
    pub identity_removal: bool,
    pub inline_filter: bool,
    pub incident_to_adjacent: bool,
    /// Reject traversals holding closures
    pub lambda_restriction: bool,
    /// Reject traversals that mutate the graph
    pub read_only: bool,
}

impl Default for StrategyToggles {
    fn default() -> Self {
        Self {
            identity_removal: true,
            inline_filter: true,
            incident_to_adjacent: true,
            lambda_restriction: false,
            read_only: false,
        }
    }
}

/// Settings of the element id strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementIdConfig {
    pub property_key: String,
}

impl Default for ElementIdConfig {
    fn default() -> Self {
        Self {
            property_key: DEFAULT_ID_PROPERTY_KEY.to_string(),
        }
    }
}

/// Global engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategies: StrategyToggles,

    /// Store element ids in a property; disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<ElementIdConfig>,

    /// Wrap width of explanations
    pub explain_width: usize,

    /// Whether barrier steps merge equivalent traversers
    pub bulking: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategies: StrategyToggles::default(),
            element_id: None,
            explain_width: DEFAULT_EXPLAIN_WIDTH,
            bulking: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> TraversalResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            TraversalError::Configuration(format!("Invalid engine configuration: {}", e))
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> TraversalResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            TraversalError::Configuration(format!(
                "Failed to read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> TraversalResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            TraversalError::Configuration(format!("Failed to serialize configuration: {}", e))
        })
    }
}
