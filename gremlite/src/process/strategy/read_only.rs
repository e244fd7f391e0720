// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Rejects traversals that mutate the graph

use std::any::Any;

use super::lambda_restriction::find_step;
use super::{StrategyCategory, TraversalStrategy};
use crate::error::{TraversalError, TraversalResult};
use crate::process::traversal::Traversal;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyStrategy;

impl TraversalStrategy for ReadOnlyStrategy {
    fn category(&self) -> StrategyCategory {
        StrategyCategory::Verification
    }

    fn apply(&self, traversal: &mut Traversal) -> TraversalResult<()> {
        match find_step(traversal, &|step| step.capabilities().mutating) {
            Some(step) => Err(TraversalError::Verification(format!(
                "The provided traversal has a mutating step and thus is not read-only: {}",
                step
            ))),
            None => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
